//! End-to-end upload check: access, create, fetch, update, list, delete.
//!
//! Drives a configured client through the whole project lifecycle and logs
//! the editor links for the sketch it created.

use tracing::info;

use crate::client::SketchClient;
use crate::error::ClientError;
use crate::types::{FileEntry, NewProject, Project, ProjectUpdate, SketchSummary};

const ANIMATED_SKETCH: &str = "let angle = 0;

function setup() {
  createCanvas(400, 400);
}

function draw() {
  background(220);
  translate(width / 2, height / 2);
  rotate(angle);
  fill(255, 0, 0);
  rect(-50, -50, 100, 100);
  angle += 0.02;
}
";

#[derive(Debug, Clone)]
pub struct UploadOptions {
    pub name: String,
    /// Delete the project once every other step passed.
    pub cleanup: bool,
}

impl Default for UploadOptions {
    fn default() -> Self {
        Self {
            name: "Upload check".to_string(),
            cleanup: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct UploadReport {
    /// Outcome of the access check; `None` when the endpoint is absent.
    pub access: Option<bool>,
    /// The project after the update step.
    pub project: Project,
    pub sketch_url: Option<String>,
    pub full_view_url: Option<String>,
    pub listed: Vec<SketchSummary>,
    pub deleted: bool,
}

pub fn run_upload(client: &SketchClient, options: &UploadOptions) -> Result<UploadReport, ClientError> {
    let access = client.check_access()?;
    match access {
        Some(true) => info!(auth = client.credential().scheme(), "credential accepted"),
        Some(false) => info!(auth = client.credential().scheme(), "credential rejected"),
        None => info!("access-check endpoint not available"),
    }

    let created: Project = client
        .create_project(&NewProject::starter(options.name.as_str()))?
        .json()?;
    info!(id = %created.id, name = %created.name, "project created");

    let fetched: Project = client.get_project(&created.id)?.json()?;

    let files = fetched
        .files
        .iter()
        .cloned()
        .map(|mut file| {
            if file.name == "sketch.js" {
                file.content = ANIMATED_SKETCH.to_string();
            }
            file
        })
        .collect::<Vec<FileEntry>>();
    let update = ProjectUpdate {
        name: Some(format!("{} - updated", options.name)),
        files: Some(files),
    };
    let project: Project = client.update_project(&created.id, &update)?.json()?;
    info!(id = %project.id, name = %project.name, "project updated");

    let username = project.owner_username().map(str::to_string);
    let (sketch_url, full_view_url, listed) = match username.as_deref() {
        Some(username) => {
            let sketch_url = client.sketch_url(username, &project.id);
            let full_view_url = client.full_view_url(username, &project.id);
            info!(%sketch_url, %full_view_url, "editor links");
            let listed: Vec<SketchSummary> = client.list_user_projects(username)?.json()?;
            info!(username, count = listed.len(), "listed sketches");
            (Some(sketch_url), Some(full_view_url), listed)
        }
        None => (None, None, Vec::new()),
    };

    let deleted = if options.cleanup {
        client.delete_project(&project.id)?;
        info!(id = %project.id, "project deleted");
        true
    } else {
        false
    };

    Ok(UploadReport {
        access,
        project,
        sketch_url,
        full_view_url,
        listed,
        deleted,
    })
}
