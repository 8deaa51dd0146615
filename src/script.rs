//! Purpose: Scripted, timed construction of a `Document`, the way a streaming parser would build it.
//! Exports: `Script`, `Step`, `Op`, `ScriptBuilder`, `replay`.
//! Role: Input format of the CLI and a fixture generator for tests.
//! Invariants: Steps are ordered by `at_ms`; `open`/`leaf` always append at the current insertion point.
//! Invariants: Only `inject` places nodes anywhere else (out-of-band insertion).
use crate::api::{
    BlockingClock, Document, DocumentTree, ElementSpec, Error, ErrorKind, NodeId, Watcher,
};
use serde::Deserialize;
use std::path::Path;
use std::rc::Rc;
use std::time::Duration;

#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Script {
    pub steps: Vec<Step>,
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
pub struct Step {
    #[serde(default)]
    pub at_ms: u64,
    #[serde(flatten)]
    pub op: Op,
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Op {
    /// Append an element and make it the insertion point.
    Open(ElementSpec),
    /// Append an element without descending into it.
    Leaf(ElementSpec),
    /// Pop the insertion point back to the parent.
    Close,
    /// Insert directly after the first match of `after`, bypassing the insertion point.
    Inject { after: String, element: ElementSpec },
    /// Mark the document fully constructed.
    Finish,
}

impl Script {
    pub fn from_json_str(text: &str) -> Result<Self, Error> {
        let script: Script = serde_json::from_str(text).map_err(|err| {
            Error::new(ErrorKind::Parse)
                .with_message(format!("invalid script: {err}"))
                .with_hint("Expected {\"steps\": [{\"at_ms\": 0, \"op\": \"open\", \"tag\": \"div\"}, ...]}.")
                .with_source(err)
        })?;
        script.validate()?;
        Ok(script)
    }

    pub fn from_path(path: &Path) -> Result<Self, Error> {
        let text = std::fs::read_to_string(path).map_err(|err| {
            let kind = if err.kind() == std::io::ErrorKind::NotFound {
                ErrorKind::NotFound
            } else {
                ErrorKind::Io
            };
            Error::new(kind)
                .with_message("failed to read script")
                .with_path(path)
                .with_source(err)
        })?;
        Self::from_json_str(&text).map_err(|err| err.with_path(path))
    }

    /// Time of the last step, or zero for an empty script.
    pub fn duration(&self) -> Duration {
        self.steps
            .last()
            .map(|step| Duration::from_millis(step.at_ms))
            .unwrap_or_default()
    }

    fn validate(&self) -> Result<(), Error> {
        for (index, pair) in self.steps.windows(2).enumerate() {
            if pair[1].at_ms < pair[0].at_ms {
                return Err(Error::new(ErrorKind::Usage)
                    .with_message(format!(
                        "step {} at {}ms comes before the previous step at {}ms",
                        index + 1,
                        pair[1].at_ms,
                        pair[0].at_ms
                    ))
                    .with_hint("Order steps by at_ms."));
            }
        }
        Ok(())
    }
}

/// Applies ops to a document while tracking the parser-style insertion point.
#[derive(Debug)]
pub struct ScriptBuilder {
    document: Rc<Document>,
    open: Vec<NodeId>,
}

impl ScriptBuilder {
    pub fn new(document: Rc<Document>) -> Self {
        let root = document.root();
        Self {
            document,
            open: vec![root],
        }
    }

    pub fn document(&self) -> &Rc<Document> {
        &self.document
    }

    pub fn insertion_point(&self) -> NodeId {
        self.open
            .last()
            .copied()
            .unwrap_or_else(|| self.document.root())
    }

    /// Returns the node the op created, if any.
    pub fn apply(&mut self, op: &Op) -> Result<Option<NodeId>, Error> {
        match op {
            Op::Open(element) => {
                let node = self
                    .document
                    .append_element(self.insertion_point(), element.clone())?;
                self.open.push(node);
                Ok(Some(node))
            }
            Op::Leaf(element) => {
                let node = self
                    .document
                    .append_element(self.insertion_point(), element.clone())?;
                Ok(Some(node))
            }
            Op::Close => {
                if self.open.len() <= 1 {
                    return Err(Error::new(ErrorKind::Usage)
                        .with_message("`close` without a matching `open`"));
                }
                self.open.pop();
                Ok(None)
            }
            Op::Inject { after, element } => {
                let reference = self
                    .document
                    .select(after)
                    .into_iter()
                    .next()
                    .ok_or_else(|| {
                        Error::new(ErrorKind::NotFound)
                            .with_message(format!("inject target `{after}` matches nothing"))
                    })?;
                let node = self.document.insert_after(reference, element.clone())?;
                Ok(Some(node))
            }
            Op::Finish => {
                self.document.finish();
                Ok(None)
            }
        }
    }
}

/// Plays `script` against `builder`'s document, letting `watcher` tick in between,
/// then drives the watcher until nothing is pending.
pub fn replay<C: BlockingClock>(
    script: &Script,
    builder: &mut ScriptBuilder,
    watcher: &Watcher<Document, C>,
) -> Result<(), Error> {
    for step in &script.steps {
        watcher.advance_to(Duration::from_millis(step.at_ms));
        builder.apply(&step.op)?;
    }
    watcher.run_until_idle();
    Ok(())
}
