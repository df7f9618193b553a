use crate::domain::conversation::InboundEvent;
use crate::domain::user::UserId;
use crate::error::{GateError, Result};
use serde::Deserialize;
use std::io::Read;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, PartialEq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum ScriptKind {
    Message,
    Webhook,
}

/// One row of a replay script: `kind,user,text,image,signature`.
///
/// For webhooks `text` carries the raw JSON body and `signature` the header
/// value the provider sent with it.
#[derive(Debug, Deserialize, PartialEq, Clone)]
pub struct ScriptRecord {
    pub kind: ScriptKind,
    pub user: Option<String>,
    pub text: Option<String>,
    pub image: Option<PathBuf>,
    pub signature: Option<String>,
}

/// A replay step ready to be fed into the pipeline.
#[derive(Debug, PartialEq, Clone)]
pub enum ScriptEvent {
    Message(InboundEvent),
    Webhook { body: Vec<u8>, signature: String },
}

fn non_empty(field: Option<String>) -> Option<String> {
    field.filter(|value| !value.is_empty())
}

impl ScriptRecord {
    /// Loads the referenced image, resolving relative paths against `base_dir`.
    pub fn into_event(self, base_dir: &Path) -> Result<ScriptEvent> {
        match self.kind {
            ScriptKind::Message => {
                let user = non_empty(self.user)
                    .ok_or_else(|| GateError::Validation("message row without user".to_string()))?;
                let text = non_empty(self.text);
                let image = match self.image.filter(|path| !path.as_os_str().is_empty()) {
                    Some(path) => Some(std::fs::read(base_dir.join(path))?),
                    None => None,
                };
                if text.is_none() && image.is_none() {
                    return Err(GateError::Validation(format!(
                        "message row for {user} has neither text nor image"
                    )));
                }
                Ok(ScriptEvent::Message(InboundEvent {
                    user: UserId::new(user),
                    text,
                    image,
                }))
            }
            ScriptKind::Webhook => {
                let body = non_empty(self.text)
                    .ok_or_else(|| GateError::Validation("webhook row without body".to_string()))?;
                Ok(ScriptEvent::Webhook {
                    body: body.into_bytes(),
                    signature: self.signature.unwrap_or_default(),
                })
            }
        }
    }
}

/// Reads replay scripts from a CSV source.
///
/// Fields are trimmed and short rows are accepted, so trailing empty columns
/// may be left out.
pub struct ScriptReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> ScriptReader<R> {
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    /// Lazily deserializes the rows.
    pub fn records(self) -> impl Iterator<Item = Result<ScriptRecord>> {
        self.reader
            .into_deserialize()
            .map(|result| result.map_err(GateError::from))
    }
}
