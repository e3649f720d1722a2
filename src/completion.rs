//! # Shell Completion Module
//!
//! Static completion scripts come from `clap_complete`. The enhanced bash and
//! fish scripts additionally complete block names by calling the hidden
//! `complete-blocks` command, which reads them from the database.
//!
//! ```bash
//! blockplay completion zsh > ~/.config/zsh/completions/_blockplay
//! blockplay completion-enhanced fish > ~/.config/fish/completions/blockplay.fish
//! ```

use anyhow::Result;
use clap::Command;
use clap_complete::{generate, Generator, Shell as CompletionShell};
use std::io;
use std::path::Path;

use crate::db::Store;
use crate::repository::PlayBlockConfig;
use crate::track::DEFAULT_BLOCKS;

/// Generate shell completions for the given shell
pub fn generate_completions<G: Generator>(gen: G, cmd: &mut Command) {
    let name = cmd.get_name().to_string();
    generate(gen, cmd, name, &mut io::stdout());
}

const SUBCOMMANDS: &str =
    "init-db import tracks blocks rules generate daily weekly show history schedule export completion completion-enhanced help";

/// Fish completion script with block name completion
#[must_use]
pub fn enhanced_fish_completion() -> String {
    format!(
        r#"# blockplay completion for fish with block names
# Install with: blockplay completion-enhanced fish > ~/.config/fish/completions/blockplay.fish

function __blockplay_complete_blocks
    if command -sq blockplay
        blockplay complete-blocks 2>/dev/null
    end
end

complete -c blockplay -e
complete -c blockplay -f -n '__fish_is_first_token' -a '{SUBCOMMANDS}'
complete -c blockplay -f -n '__fish_seen_subcommand_from generate show export' -a '(__blockplay_complete_blocks)' -d 'Play block'
complete -c blockplay -f -n '__fish_seen_subcommand_from generate daily weekly' -l force -d 'Replace existing playlists'
complete -c blockplay -f -n '__fish_seen_subcommand_from generate daily weekly' -l admin-override -d 'Ignore the track cooldown'
complete -c blockplay -f -n '__fish_seen_subcommand_from export' -l format -a 'csv m3u json' -d 'Output format'
complete -c blockplay -f -n '__fish_seen_subcommand_from completion completion-enhanced' -a 'bash zsh fish power-shell elvish'
"#
    )
}

/// Bash completion script with block name completion
#[must_use]
pub fn enhanced_bash_completion() -> String {
    format!(
        r#"#!/bin/bash
# blockplay completion for bash with block names
# Install with: blockplay completion-enhanced bash > ~/.local/share/bash-completion/completions/blockplay

_blockplay() {{
    local cur prev words cword
    _init_completion || return

    case "${{prev}}" in
        --format|-f)
            COMPREPLY=($(compgen -W "csv m3u json" -- "${{cur}}"))
            return 0
            ;;
        completion|completion-enhanced)
            COMPREPLY=($(compgen -W "bash zsh fish power-shell elvish" -- "${{cur}}"))
            return 0
            ;;
    esac

    if [[ $cword -eq 1 ]]; then
        COMPREPLY=($(compgen -W "{SUBCOMMANDS} --help --version" -- "${{cur}}"))
        return 0
    fi

    case "${{words[1]}}" in
        generate|show|export)
            # Third word is the block name.
            if [[ $cword -eq 3 ]]; then
                mapfile -t COMPREPLY < <(blockplay complete-blocks 2>/dev/null | grep -i "^${{cur}}")
            else
                COMPREPLY=($(compgen -W "--force --admin-override --format --out --stdout --help" -- "${{cur}}"))
            fi
            ;;
        daily|weekly)
            COMPREPLY=($(compgen -W "--force --admin-override --help" -- "${{cur}}"))
            ;;
        *)
            COMPREPLY=($(compgen -W "{SUBCOMMANDS}" -- "${{cur}}"))
            ;;
    esac
}} &&
complete -F _blockplay blockplay

# ex: filetype=sh
"#
    )
}

/// Convert our Shell enum to clap_complete's Shell enum
#[must_use]
pub fn shell_to_completion_shell(shell: crate::cli::Shell) -> CompletionShell {
    match shell {
        crate::cli::Shell::Bash => CompletionShell::Bash,
        crate::cli::Shell::Zsh => CompletionShell::Zsh,
        crate::cli::Shell::Fish => CompletionShell::Fish,
        crate::cli::Shell::PowerShell => CompletionShell::PowerShell,
        crate::cli::Shell::Elvish => CompletionShell::Elvish,
    }
}

/// Block names for completion. Falls back to the default blocks when the
/// database is missing or unreadable; completion must never fail loudly.
#[must_use]
pub fn block_completions(db_path: &Path) -> Vec<String> {
    let defaults = || DEFAULT_BLOCKS.iter().map(ToString::to_string).collect();
    if !db_path.exists() {
        return defaults();
    }
    match Store::open(db_path).and_then(|store| store.all()) {
        Ok(blocks) if !blocks.is_empty() => blocks.into_iter().map(|b| b.name).collect(),
        Ok(_) => defaults(),
        Err(err) => {
            log::debug!("Block completion fell back to defaults: {err:#}");
            defaults()
        }
    }
}

pub fn print_block_completions(db_path: &Path) -> Result<()> {
    for name in block_completions(db_path) {
        println!("{name}");
    }
    Ok(())
}
