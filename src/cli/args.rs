//! cli::args
//!
//! Command-line argument definitions using clap derive.
//!
//! # Global Flags
//!
//! These flags are available on all commands:
//! - `--help` / `-h`: Show help
//! - `--version`: Show version
//! - `--store <path>`: Use this configuration store
//! - `--debug`: Enable debug logging
//! - `--quiet` / `-q`: Minimal output

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Espalier - edit IP configuration BOM trees
#[derive(Parser, Debug)]
#[command(name = "esp")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to the configuration store directory
    #[arg(long, global = true, value_name = "PATH")]
    pub store: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    /// Minimal output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Parser::parse()
    }
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Edit a configuration tree
    #[command(
        name = "edit",
        long_about = "Edit a configuration tree.\n\n\
            Loads the tree rooted at TARGET, applies every requested operation, \
            and saves the result. Composite edits run before libtype edits, and \
            within each group deletions run before additions before replacements.\n\n\
            Editing the children of an immutable (REL/PREL/snap-) configuration \
            is only allowed with --new-config: every immutable configuration on a \
            path to a change is saved under the new name, and the originals are \
            left untouched. Mutable configurations can be edited with --inplace.",
        after_help = "\
WORKFLOW EXAMPLES:
    # Swap a released subtree for a newer release, saving under a new name
    esp edit soc/top@REL5.0 --new-config fixup --rep-config soc/ddr REL5.1

    # Remove a variant everywhere it appears under a dev tree
    esp edit soc/top@dev --inplace --del-config soc/scratch

    # Remove it only where soc/island is the parent
    esp edit soc/top@dev --inplace --del-config soc/scratch,soc/island

    # Check what an edit would do without saving anything
    esp edit soc/top@REL5.0 --new-config fixup --del-libtype soc/top:oa \\
        --preview --show-tree

    # Drive a scripted edit from a TOML plan file
    esp edit --plan nightly-fixup.toml"
    )]
    Edit {
        /// Root of the tree to edit, as PROJECT/VARIANT@CONFIG
        #[arg(value_name = "TARGET", required_unless_present = "plan")]
        target: Option<String>,

        /// Read the whole edit request from a TOML file instead of flags
        #[arg(long, value_name = "FILE", conflicts_with = "target")]
        plan: Option<PathBuf>,

        /// Apply the edits to the named configuration itself
        #[arg(long)]
        inplace: bool,

        /// Save the edited tree under this configuration name
        #[arg(long, value_name = "NAME")]
        new_config: Option<String>,

        /// Link config SOURCE (PROJECT/VARIANT@CONFIG) under every
        /// occurrence of TARGET (PROJECT/VARIANT)
        #[arg(long = "add-config", num_args = 2, value_names = ["SOURCE", "TARGET"],
              action = clap::ArgAction::Append)]
        add_config: Vec<String>,

        /// Unlink every occurrence of a config; list parents after the
        /// target to only unlink from those parents
        #[arg(long = "del-config", value_name = "TARGET[,PARENT...]",
              action = clap::ArgAction::Append)]
        del_config: Vec<String>,

        /// Swap every occurrence of TARGET (PROJECT/VARIANT) for its
        /// configuration named NEW
        #[arg(long = "rep-config", num_args = 2, value_names = ["TARGET", "NEW"],
              action = clap::ArgAction::Append)]
        rep_config: Vec<String>,

        /// Link library SOURCE (PROJECT/VARIANT:LIBTYPE@LIBRARY) under the
        /// composites at its location; append ,CONFIG to restrict to
        /// composites with that config name
        #[arg(long = "add-libtype", value_name = "SOURCE[,CONFIG]",
              action = clap::ArgAction::Append)]
        add_libtype: Vec<String>,

        /// Remove every leaf at TARGET (PROJECT/VARIANT:LIBTYPE)
        #[arg(long = "del-libtype", value_name = "TARGET",
              action = clap::ArgAction::Append)]
        del_libtype: Vec<String>,

        /// Swap every leaf at TARGET (PROJECT/VARIANT:LIBTYPE) for the
        /// library or release named NEW
        #[arg(long = "rep-libtype", num_args = 2, value_names = ["TARGET", "NEW"],
              action = clap::ArgAction::Append)]
        rep_libtype: Vec<String>,

        /// Keep only leaves with these libtypes
        #[arg(long = "include-libtypes", value_name = "LIBTYPE", num_args = 1..)]
        include_libtypes: Vec<String>,

        /// Drop every leaf with these libtypes
        #[arg(long = "exclude-libtypes", value_name = "LIBTYPE", num_args = 1..)]
        exclude_libtypes: Vec<String>,

        /// Run every step except saving the result
        #[arg(long)]
        preview: bool,

        /// Print the edited tree when the run finishes
        #[arg(long)]
        show_tree: bool,
    },

    /// Print the stored tree for a configuration
    #[command(
        name = "show",
        long_about = "Print the stored tree for a configuration.\n\n\
            Renders the full tree rooted at TARGET, one node per line, indented \
            by depth. Library leaves print before subconfigs at each level."
    )]
    Show {
        /// Configuration to render, as PROJECT/VARIANT@CONFIG
        #[arg(value_name = "TARGET")]
        target: String,
    },

    /// Create an empty configuration store
    #[command(
        name = "init",
        long_about = "Create an empty configuration store.\n\n\
            Writes a fresh store document under the store directory (see \
            --store). Does nothing if the store already exists."
    )]
    Init,

    /// Generate shell completion scripts
    Completion {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Supported shells for completion
#[derive(clap::ValueEnum, Debug, Clone, Copy)]
#[allow(clippy::enum_variant_names)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(args).unwrap()
    }

    #[test]
    fn edit_collects_repeated_operation_flags() {
        let cli = parse(&[
            "esp",
            "edit",
            "soc/top@REL5.0",
            "--new-config",
            "fixup",
            "--add-config",
            "soc/io@dev",
            "soc/top",
            "--del-config",
            "soc/scratch,soc/island",
            "--del-config",
            "soc/old",
            "--rep-libtype",
            "soc/top:rtl",
            "REL9.9",
        ]);

        match cli.command {
            Command::Edit {
                target,
                new_config,
                add_config,
                del_config,
                rep_libtype,
                ..
            } => {
                assert_eq!(target.as_deref(), Some("soc/top@REL5.0"));
                assert_eq!(new_config.as_deref(), Some("fixup"));
                assert_eq!(add_config, vec!["soc/io@dev", "soc/top"]);
                assert_eq!(del_config, vec!["soc/scratch,soc/island", "soc/old"]);
                assert_eq!(rep_libtype, vec!["soc/top:rtl", "REL9.9"]);
            }
            other => panic!("expected edit, got {other:?}"),
        }
    }

    #[test]
    fn edit_requires_a_target_or_a_plan() {
        assert!(Cli::try_parse_from(["esp", "edit", "--inplace"]).is_err());
        assert!(Cli::try_parse_from(["esp", "edit", "--plan", "x.toml"]).is_ok());
        assert!(
            Cli::try_parse_from(["esp", "edit", "soc/top@dev", "--plan", "x.toml"]).is_err()
        );
    }

    #[test]
    fn libtype_filters_take_several_values() {
        let cli = parse(&[
            "esp",
            "edit",
            "soc/top@dev",
            "--inplace",
            "--include-libtypes",
            "rtl",
            "oa",
            "upf",
        ]);
        match cli.command {
            Command::Edit {
                include_libtypes, ..
            } => assert_eq!(include_libtypes, vec!["rtl", "oa", "upf"]),
            other => panic!("expected edit, got {other:?}"),
        }
    }

    #[test]
    fn global_flags_apply_after_the_subcommand() {
        let cli = parse(&["esp", "show", "soc/top@dev", "--store", "/tmp/s", "--debug"]);
        assert_eq!(cli.store.as_deref(), Some(std::path::Path::new("/tmp/s")));
        assert!(cli.debug);
    }
}
