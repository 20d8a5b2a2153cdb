// Upload workflow: resolve the file, authenticate, look up the site and its
// drive, then push the file under a timestamped name. All user-facing lines
// go to `out`; remote failures are printed (red on a terminal) and end the
// run without an error return.

use crate::config::Settings;
use crate::error::GraphUploadError;
use crate::files::{resolve_target, target_exists};
use crate::graph::DocumentGraph;
use crate::naming::timestamped_name;
use anyhow::Result;
use crossterm::queue;
use crossterm::style::{Color, ResetColor, SetForegroundColor};
use indicatif::{ProgressBar, ProgressStyle};
use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::time::Duration;
use tracing::info;

pub const USAGE: &str = "Usage: graph-upload <path-to-file>";

/// How a run ended. Every variant is a clean exit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    FileNotFound,
    NoDocumentLibrary,
    /// Upload finished; carries the item's web URL when Graph returned one.
    Uploaded(Option<String>),
    Failed,
}

/// Run the whole upload against `graph`, printing progress to `out`.
/// Failure lines are colored only when `color` is set.
///
/// Remote and local I/O faults during the upload, including a failed write
/// of a progress line, are printed and end as `Outcome::Failed`. An error is
/// returned only when the file-not-found lines or the failure report itself
/// cannot be written.
pub fn run<G, W>(
    graph: &mut G,
    settings: &Settings,
    file_arg: Option<&Path>,
    out: &mut W,
    color: bool,
) -> Result<Outcome>
where
    G: DocumentGraph,
    W: Write,
{
    let path = resolve_target(file_arg);
    if !target_exists(&path) {
        writeln!(out, "File not found: {}", path.display())?;
        writeln!(out, "{USAGE}")?;
        return Ok(Outcome::FileNotFound);
    }

    match upload(graph, settings, &path, out) {
        Ok(outcome) => Ok(outcome),
        Err(e) => {
            report_failure(out, e, color)?;
            Ok(Outcome::Failed)
        }
    }
}

fn upload<G, W>(
    graph: &mut G,
    settings: &Settings,
    path: &Path,
    out: &mut W,
) -> crate::error::Result<Outcome>
where
    G: DocumentGraph,
    W: Write,
{
    graph.authenticate()?;
    writeln!(
        out,
        "Authenticated using app client id {}.",
        settings.client_id
    )?;

    let site = graph.site(&settings.site_resource_id)?.unwrap_or_default();
    let label = site
        .display_name
        .as_deref()
        .or(site.name.as_deref())
        .unwrap_or(&settings.site_resource_id);
    writeln!(out, "Found site '{label}'.")?;

    let drive_id = match graph
        .default_drive(&settings.site_resource_id)?
        .and_then(|d| d.id)
    {
        Some(id) => id,
        None => {
            writeln!(out, "The site does not expose a default document library.")?;
            return Ok(Outcome::NoDocumentLibrary);
        }
    };

    let file = File::open(path)?;
    let remote_name = timestamped_name(path);
    info!(%remote_name, %drive_id, "starting upload");

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::with_template("{spinner} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.set_message(format!("Uploading {remote_name}..."));
    spinner.enable_steady_tick(Duration::from_millis(100));
    let uploaded = graph.upload_content(&drive_id, &remote_name, file);
    spinner.finish_and_clear();

    let web_url = uploaded?.and_then(|item| item.web_url);
    writeln!(
        out,
        "Upload complete! View it at: {}",
        web_url.as_deref().unwrap_or("unknown location")
    )?;
    Ok(Outcome::Uploaded(web_url))
}

/// Print a failure (red when `color`): status for Graph faults, the full
/// chain for anything else.
fn report_failure<W: Write>(out: &mut W, err: GraphUploadError, color: bool) -> Result<()> {
    if color {
        queue!(out, SetForegroundColor(Color::Red))?;
    }
    match (err.is_service(), err.status()) {
        (true, Some(status)) => {
            writeln!(out, "Graph call failed: {err}")?;
            writeln!(out, "HTTP status: {status}")?;
        }
        _ => {
            writeln!(out, "Unhandled failure: {err}")?;
            writeln!(out, "{:?}", anyhow::Error::from(err))?;
        }
    }
    if color {
        queue!(out, ResetColor)?;
    }
    out.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result as GraphResult;
    use crate::graph::{Drive, DriveItem, Site};
    use reqwest::StatusCode;
    use std::cell::RefCell;
    use std::io::Read;
    use tempfile::tempdir;

    /// Scripted `DocumentGraph` that records the calls made against it.
    #[derive(Default)]
    struct FakeGraph {
        site: Option<Site>,
        drive: Option<Drive>,
        item: Option<DriveItem>,
        fail_site: bool,
        fail_auth: bool,
        calls: RefCell<Vec<String>>,
        uploaded: RefCell<Option<(String, String, Vec<u8>)>>,
    }

    impl DocumentGraph for FakeGraph {
        fn authenticate(&mut self) -> GraphResult<()> {
            self.calls.borrow_mut().push("authenticate".into());
            if self.fail_auth {
                return Err(GraphUploadError::Authentication {
                    status: StatusCode::UNAUTHORIZED,
                    message: "invalid_client".into(),
                });
            }
            Ok(())
        }

        fn site(&self, site_id: &str) -> GraphResult<Option<Site>> {
            self.calls.borrow_mut().push(format!("site {site_id}"));
            if self.fail_site {
                return Err(GraphUploadError::Service {
                    status: StatusCode::NOT_FOUND,
                    code: Some("itemNotFound".into()),
                    message: "Requested site could not be found".into(),
                });
            }
            Ok(self.site.clone())
        }

        fn default_drive(&self, site_id: &str) -> GraphResult<Option<Drive>> {
            self.calls.borrow_mut().push(format!("drive {site_id}"));
            Ok(self.drive.clone())
        }

        fn upload_content(
            &self,
            drive_id: &str,
            remote_name: &str,
            mut file: File,
        ) -> GraphResult<Option<DriveItem>> {
            self.calls.borrow_mut().push("upload".into());
            let mut bytes = Vec::new();
            file.read_to_end(&mut bytes)?;
            *self.uploaded.borrow_mut() =
                Some((drive_id.to_string(), remote_name.to_string(), bytes));
            Ok(self.item.clone())
        }
    }

    fn settings() -> Settings {
        Settings {
            tenant_id: "tenant".into(),
            client_id: "app-123".into(),
            client_secret: "secret".into(),
            site_resource_id: "contoso.sharepoint.com,1,2".into(),
        }
    }

    fn happy_graph() -> FakeGraph {
        FakeGraph {
            site: Some(Site {
                id: Some("contoso.sharepoint.com,1,2".into()),
                name: Some("team".into()),
                display_name: Some("Team Site".into()),
                web_url: Some("https://contoso.sharepoint.com/sites/team".into()),
            }),
            drive: Some(Drive {
                id: Some("b!drive".into()),
            }),
            item: Some(DriveItem {
                web_url: Some("https://contoso.sharepoint.com/report.csv".into()),
                ..DriveItem::default()
            }),
            ..FakeGraph::default()
        }
    }

    fn run_colored(
        graph: &mut FakeGraph,
        file: Option<&Path>,
        color: bool,
    ) -> (Outcome, String) {
        let mut out = Vec::new();
        let outcome = run(graph, &settings(), file, &mut out, color).unwrap();
        (outcome, String::from_utf8(out).unwrap())
    }

    fn run_with(graph: &mut FakeGraph, file: Option<&Path>) -> (Outcome, String) {
        run_colored(graph, file, false)
    }

    #[test]
    fn uploads_report_csv() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("report.csv");
        std::fs::write(&file, b"a,b\n1,2\n").unwrap();
        let mut graph = happy_graph();

        let (outcome, text) = run_with(&mut graph, Some(&file));

        assert_eq!(
            outcome,
            Outcome::Uploaded(Some("https://contoso.sharepoint.com/report.csv".into()))
        );
        assert!(text.contains("Authenticated using app client id app-123."));
        assert!(text.contains("Found site 'Team Site'."));
        assert!(text.contains(
            "Upload complete! View it at: https://contoso.sharepoint.com/report.csv"
        ));

        let (drive, name, bytes) = graph.uploaded.borrow().clone().unwrap();
        assert_eq!(drive, "b!drive");
        assert!(name.starts_with("report-") && name.ends_with(".csv"));
        assert_eq!(bytes, b"a,b\n1,2\n");
    }

    #[test]
    fn missing_file_skips_authentication() {
        let dir = tempdir().unwrap();
        let mut graph = happy_graph();

        let (outcome, text) = run_with(&mut graph, Some(&dir.path().join("nope.txt")));

        assert_eq!(outcome, Outcome::FileNotFound);
        assert!(text.contains("File not found: "));
        assert!(text.contains("nope.txt"));
        assert!(text.contains(USAGE));
        assert!(graph.calls.borrow().is_empty());
    }

    #[test]
    fn drive_without_id_stops_before_upload() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("report.csv");
        std::fs::write(&file, b"x").unwrap();
        let mut graph = FakeGraph {
            drive: Some(Drive { id: None }),
            ..happy_graph()
        };

        let (outcome, text) = run_with(&mut graph, Some(&file));

        assert_eq!(outcome, Outcome::NoDocumentLibrary);
        assert!(text.contains("does not expose a default document library"));
        assert!(!graph.calls.borrow().iter().any(|c| c == "upload"));
    }

    #[test]
    fn site_label_falls_back_to_name_then_id() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("a.txt");
        std::fs::write(&file, b"x").unwrap();

        let mut graph = FakeGraph {
            site: Some(Site {
                name: Some("team".into()),
                ..Site::default()
            }),
            ..happy_graph()
        };
        let (_, text) = run_with(&mut graph, Some(&file));
        assert!(text.contains("Found site 'team'."));

        let mut graph = FakeGraph {
            site: None,
            ..happy_graph()
        };
        let (_, text) = run_with(&mut graph, Some(&file));
        assert!(text.contains("Found site 'contoso.sharepoint.com,1,2'."));
    }

    #[test]
    fn empty_upload_response_reports_unknown_location() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("a.txt");
        std::fs::write(&file, b"x").unwrap();
        let mut graph = FakeGraph {
            item: None,
            ..happy_graph()
        };

        let (outcome, text) = run_with(&mut graph, Some(&file));

        assert_eq!(outcome, Outcome::Uploaded(None));
        assert!(text.contains("Upload complete! View it at: unknown location"));
    }

    #[test]
    fn service_fault_prints_status_and_does_not_fail() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("a.txt");
        std::fs::write(&file, b"x").unwrap();
        let mut graph = FakeGraph {
            fail_site: true,
            ..happy_graph()
        };

        let (outcome, text) = run_with(&mut graph, Some(&file));

        assert_eq!(outcome, Outcome::Failed);
        assert!(text.contains("Graph call failed: Requested site could not be found"));
        assert!(text.contains("HTTP status: 404 Not Found"));
        assert!(!graph.calls.borrow().iter().any(|c| c.starts_with("drive")));
    }

    #[test]
    fn authentication_fault_is_reported_as_unhandled() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("a.txt");
        std::fs::write(&file, b"x").unwrap();
        let mut graph = FakeGraph {
            fail_auth: true,
            ..happy_graph()
        };

        let (outcome, text) = run_with(&mut graph, Some(&file));

        assert_eq!(outcome, Outcome::Failed);
        assert!(text.contains("Unhandled failure: Authentication failed"));
        assert!(!text.contains("Authenticated using app client id"));
        assert_eq!(graph.calls.borrow().as_slice(), ["authenticate"]);
    }

    #[test]
    fn plain_output_has_no_escape_codes() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("a.txt");
        std::fs::write(&file, b"x").unwrap();
        let mut graph = FakeGraph {
            fail_site: true,
            ..happy_graph()
        };

        let (_, text) = run_colored(&mut graph, Some(&file), false);

        assert!(text.contains("Graph call failed"));
        assert!(!text.contains('\x1b'));
    }

    #[test]
    fn colored_failure_is_wrapped_in_escape_codes() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("a.txt");
        std::fs::write(&file, b"x").unwrap();
        let mut graph = FakeGraph {
            fail_site: true,
            ..happy_graph()
        };

        let (_, text) = run_colored(&mut graph, Some(&file), true);

        assert!(text.starts_with("Authenticated using app client id"));
        let red = text.find('\x1b').unwrap();
        assert!(red < text.find("Graph call failed").unwrap());
        assert!(text.trim_end().ends_with("\x1b[0m"));
    }

    /// Writer that accepts `ok_lines` lines, then fails `failures` writes.
    struct FlakyWriter {
        ok_lines: usize,
        failures: usize,
        buf: Vec<u8>,
    }

    impl FlakyWriter {
        fn new(ok_lines: usize, failures: usize) -> Self {
            FlakyWriter {
                ok_lines,
                failures,
                buf: Vec::new(),
            }
        }
    }

    impl Write for FlakyWriter {
        fn write(&mut self, data: &[u8]) -> std::io::Result<usize> {
            if self.ok_lines == 0 && self.failures > 0 {
                self.failures -= 1;
                return Err(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "closed"));
            }
            let newlines = data.iter().filter(|b| **b == b'\n').count();
            self.ok_lines = self.ok_lines.saturating_sub(newlines);
            self.buf.extend_from_slice(data);
            Ok(data.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn write_failure_mid_run_is_reported_as_failed() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("a.txt");
        std::fs::write(&file, b"x").unwrap();
        let mut graph = happy_graph();
        let mut out = FlakyWriter::new(1, 1);

        let outcome = run(&mut graph, &settings(), Some(&file), &mut out, false).unwrap();

        assert_eq!(outcome, Outcome::Failed);
        let text = String::from_utf8(out.buf).unwrap();
        assert!(text.contains("Unhandled failure: I/O error: closed"));
        assert!(!graph.calls.borrow().iter().any(|c| c.starts_with("drive")));
    }

    #[test]
    fn unwritable_report_is_returned_as_error() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("a.txt");
        std::fs::write(&file, b"x").unwrap();
        let mut graph = happy_graph();
        let mut out = FlakyWriter::new(0, usize::MAX);

        let result = run(&mut graph, &settings(), Some(&file), &mut out, false);

        assert!(result.is_err());
        assert!(!graph.calls.borrow().iter().any(|c| c == "upload"));
    }
}
