//! Domain DTOs for the sketch editor API.
//!
//! # Design
//! These types mirror the mock-server's schema but are defined independently.
//! The client itself transmits payloads as opaque JSON; these types exist so
//! callers can build and decode them without hand-written `json!` blobs.
//! Integration tests catch any schema drift between the two crates.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    File,
    Folder,
}

/// One file or folder node within a sketch's file tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileEntry {
    /// Server-assigned id. Present on files returned by the API; on update,
    /// entries without an id are created as new files.
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub content: String,
    pub file_type: FileType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<FileEntry>>,
}

impl FileEntry {
    pub fn file(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
            content: content.into(),
            file_type: FileType::File,
            children: None,
        }
    }

    pub fn folder(name: impl Into<String>, children: Vec<FileEntry>) -> Self {
        Self {
            id: None,
            name: name.into(),
            content: String::new(),
            file_type: FileType::Folder,
            children: Some(children),
        }
    }
}

const STARTER_SKETCH: &str = "function setup() {
  createCanvas(400, 400);
}

function draw() {
  background(220);
}
";

const STARTER_INDEX: &str = r#"<!DOCTYPE html>
<html lang="en">
  <head>
    <meta charset="utf-8">
    <script src="https://cdnjs.cloudflare.com/ajax/libs/p5.js/1.4.0/p5.js"></script>
    <script src="sketch.js"></script>
  </head>
  <body>
  </body>
</html>
"#;

/// Payload for `POST /projects`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewProject {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub files: Vec<FileEntry>,
}

impl NewProject {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            files: Vec::new(),
        }
    }

    /// A runnable project with an empty canvas sketch and its index page.
    pub fn starter(name: impl Into<String>) -> Self {
        Self::named(name)
            .with_file(FileEntry::file("sketch.js", STARTER_SKETCH))
            .with_file(FileEntry::file("index.html", STARTER_INDEX))
    }

    pub fn with_file(mut self, file: FileEntry) -> Self {
        self.files.push(file);
        self
    }
}

/// Partial update payload for `PUT /projects/{id}`. Omitted fields remain
/// unchanged on the server.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub files: Option<Vec<FileEntry>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Owner {
    pub id: String,
    pub username: String,
}

/// A project as returned by the API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub slug: String,
    #[serde(default)]
    pub owner: Option<Owner>,
    #[serde(default)]
    pub files: Vec<FileEntry>,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub updated_at: String,
}

impl Project {
    /// Reads `owner.username` only.
    pub fn owner_username(&self) -> Option<&str> {
        self.owner.as_ref().map(|o| o.username.as_str())
    }
}

/// Entry of the public `GET /{username}/sketches` listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SketchSummary {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub slug: String,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub updated_at: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub field: String,
    pub message: String,
}

/// Error body sent with 4xx/5xx responses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    pub error: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<ErrorDetail>>,
}

/// Body of a successful `GET /auth/access-check`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessCheck {
    pub message: String,
}
