//! edit command - Run an edit session against a stored tree

use std::fs;
use std::path::PathBuf;

use anyhow::{bail, Context as _, Result};

use crate::cli::Context;
use crate::core::types::ConfigKey;
use crate::engine::{EditError, EditSession};
use crate::ops::EditRequest;
use crate::repo::FileStore;
use crate::ui::{output, render};

/// Raw flag values for an edit invocation, as collected by clap.
#[derive(Debug, Default)]
pub struct EditArgs {
    pub target: Option<String>,
    pub plan: Option<PathBuf>,
    pub inplace: bool,
    pub new_config: Option<String>,
    pub add_config: Vec<String>,
    pub del_config: Vec<String>,
    pub rep_config: Vec<String>,
    pub add_libtype: Vec<String>,
    pub del_libtype: Vec<String>,
    pub rep_libtype: Vec<String>,
    pub include_libtypes: Vec<String>,
    pub exclude_libtypes: Vec<String>,
    pub preview: bool,
    pub show_tree: bool,
}

impl EditArgs {
    /// True when any flag that describes the edit itself was given.
    ///
    /// `--preview` and `--show-tree` are not counted: they adjust how a
    /// plan runs and may accompany `--plan`.
    fn has_inline_input(&self) -> bool {
        self.target.is_some()
            || self.inplace
            || self.new_config.is_some()
            || !self.add_config.is_empty()
            || !self.del_config.is_empty()
            || !self.rep_config.is_empty()
            || !self.add_libtype.is_empty()
            || !self.del_libtype.is_empty()
            || !self.rep_libtype.is_empty()
            || !self.include_libtypes.is_empty()
            || !self.exclude_libtypes.is_empty()
    }
}

/// Run an edit session.
///
/// The session validates the request up front, so most bad invocations
/// fail here before the tree is ever loaded. When `--show-tree` is set
/// the edited tree prints even for a failed run, showing what the edits
/// produced before the failure.
pub fn edit(ctx: &Context, args: EditArgs) -> Result<()> {
    let show_tree = args.show_tree;
    let request = build_request(&args)?;

    let repo = FileStore::new(&ctx.store);
    let mut session = EditSession::new(&repo, &request)?;
    let result = session.run();

    if show_tree {
        if let Some(tree) = session.tree() {
            output::print(render::report(tree).trim_end(), ctx.verbosity);
        }
    }

    match result {
        Ok(report) => {
            if report.preview {
                output::print("Preview only, nothing saved", ctx.verbosity);
            } else {
                output::print(format!("Saved {}", report.root), ctx.verbosity);
            }
            Ok(())
        }
        Err(err) => {
            match &err {
                EditError::Degraded { failures } => {
                    output::error(format!(
                        "the following edits failed:\n{}",
                        output::format_list(failures, "  - ")
                    ));
                }
                EditError::Validation { messages } => {
                    output::error(format!(
                        "validation problems:\n{}",
                        output::format_list(messages, "  - ")
                    ));
                }
                _ => {}
            }
            Err(err.into())
        }
    }
}

/// Build the typed request from either a plan file or inline flags.
fn build_request(args: &EditArgs) -> Result<EditRequest> {
    if let Some(path) = &args.plan {
        if args.has_inline_input() {
            bail!("a plan file carries the whole request; pass flags or --plan, not both");
        }
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read plan file {}", path.display()))?;
        let mut request: EditRequest = toml::from_str(&text)
            .with_context(|| format!("failed to parse plan file {}", path.display()))?;
        request.preview |= args.preview;
        return Ok(request);
    }

    let target = args
        .target
        .as_deref()
        .context("a target configuration is required")?;
    let key = ConfigKey::parse(target)?;

    Ok(EditRequest {
        project: key.project.to_string(),
        variant: key.variant.to_string(),
        config: key.config.to_string(),
        inplace: args.inplace,
        new_config: args.new_config.clone(),
        add_configs: pair_up(&args.add_config),
        del_configs: split_entries(&args.del_config),
        rep_configs: pair_up(&args.rep_config),
        add_libtypes: split_entries(&args.add_libtype),
        del_libtypes: args.del_libtype.clone(),
        rep_libtypes: pair_up(&args.rep_libtype),
        include_libtypes: args.include_libtypes.clone(),
        exclude_libtypes: args.exclude_libtypes.clone(),
        preview: args.preview,
    })
}

/// Regroup clap's flattened two-value occurrences into pairs.
fn pair_up(flat: &[String]) -> Vec<(String, String)> {
    flat.chunks_exact(2)
        .map(|pair| (pair[0].clone(), pair[1].clone()))
        .collect()
}

/// Split each `a,b,c` occurrence into its own entry list.
fn split_entries(occurrences: &[String]) -> Vec<Vec<String>> {
    occurrences
        .iter()
        .map(|entry| entry.split(',').map(str::to_string).collect())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inline_flags_build_the_request() {
        let args = EditArgs {
            target: Some("soc/top@REL5.0".to_string()),
            new_config: Some("fixup".to_string()),
            add_config: vec![
                "soc/io@dev".to_string(),
                "soc/top".to_string(),
                "soc/mem@REL2.0".to_string(),
                "soc/island".to_string(),
            ],
            del_config: vec!["soc/scratch,soc/island".to_string()],
            del_libtype: vec!["soc/top:oa".to_string()],
            preview: true,
            ..EditArgs::default()
        };

        let request = build_request(&args).unwrap();
        assert_eq!(request.project, "soc");
        assert_eq!(request.variant, "top");
        assert_eq!(request.config, "REL5.0");
        assert_eq!(request.new_config.as_deref(), Some("fixup"));
        assert_eq!(
            request.add_configs,
            vec![
                ("soc/io@dev".to_string(), "soc/top".to_string()),
                ("soc/mem@REL2.0".to_string(), "soc/island".to_string()),
            ]
        );
        assert_eq!(
            request.del_configs,
            vec![vec!["soc/scratch".to_string(), "soc/island".to_string()]]
        );
        assert_eq!(request.del_libtypes, vec!["soc/top:oa".to_string()]);
        assert!(request.preview);
    }

    #[test]
    fn a_malformed_target_is_rejected() {
        let args = EditArgs {
            target: Some("soc/top".to_string()),
            ..EditArgs::default()
        };
        assert!(build_request(&args).is_err());
    }

    #[test]
    fn a_plan_file_is_parsed_as_a_request() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plan.toml");
        fs::write(
            &path,
            r#"
project = "soc"
variant = "top"
config = "REL5.0"
new_config = "fixup"
rep_configs = [["soc/ddr", "REL5.1"]]
del_libtypes = ["soc/top:oa"]
"#,
        )
        .unwrap();

        let args = EditArgs {
            plan: Some(path),
            preview: true,
            ..EditArgs::default()
        };
        let request = build_request(&args).unwrap();
        assert_eq!(request.config, "REL5.0");
        assert_eq!(
            request.rep_configs,
            vec![("soc/ddr".to_string(), "REL5.1".to_string())]
        );
        // The command-line --preview still applies to a plan run.
        assert!(request.preview);
    }

    #[test]
    fn a_plan_file_cannot_be_combined_with_inline_operations() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plan.toml");
        fs::write(&path, "project = \"soc\"\nvariant = \"top\"\nconfig = \"dev\"\n").unwrap();

        let args = EditArgs {
            plan: Some(path),
            inplace: true,
            ..EditArgs::default()
        };
        let err = build_request(&args).unwrap_err();
        assert!(err.to_string().contains("not both"));
    }

    #[test]
    fn unknown_plan_keys_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plan.toml");
        fs::write(
            &path,
            "project = \"soc\"\nvariant = \"top\"\nconfig = \"dev\"\nbogus = 1\n",
        )
        .unwrap();

        let args = EditArgs {
            plan: Some(path),
            ..EditArgs::default()
        };
        assert!(build_request(&args).is_err());
    }
}
