//! Line commands understood by the interactive session

use anyhow::{anyhow, bail, Result};
use ns_core::{FilterUpdate, GroupKey, Intent, ResultFormat, SortDirection, ViewKind};

/// A parsed session command
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Forward an intent to the explorer
    Intent(Intent),
    /// Resize the window, in pixels
    Width(u32),
    /// Freeze or unfreeze a view
    Freeze(ViewKind, bool),
    Show,
    Errors,
    Help,
    Quit,
}

pub const HELP: &str = "\
commands:
  query <text>            type into the search box
  search                  fetch results for the current query
  toggle <dataset>        switch a dataset on or off
  sort <field> [asc|desc] sort the table locally
  filter <field> <value>  toggle a value in the table filter (? = unknown)
  filter clear            drop every table filter
  group <field>|none      group the statistics view
  analysis on|off         open or close the analysis view
  heat on|off             switch the map to a heat map
  format table|other      pick the result presentation
  tab table|map|chart     pick the tab shown in one column
  width <px>              resize the window
  freeze|thaw <view>      stop or resume updates to a view
  clear                   clear results
  show | errors | help | quit";

pub fn parse(line: &str) -> Result<Option<Command>> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let (word, rest) = match line.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (line, ""),
    };

    let command = match word {
        "query" | "q" => Command::Intent(Intent::UpdateQuery(rest.to_string())),
        "search" => Command::Intent(Intent::FetchResults),
        "toggle" => Command::Intent(Intent::ToggleDataset(required(rest, "dataset")?.to_string())),
        "sort" => {
            let mut parts = rest.split_whitespace();
            let field = parts.next().ok_or_else(|| anyhow!("sort needs a field"))?;
            let direction = match parts.next() {
                None | Some("asc") => SortDirection::Asc,
                Some("desc") => SortDirection::Desc,
                Some(other) => bail!("unknown sort direction '{other}'"),
            };
            Command::Intent(Intent::SortResults {
                field: field.to_string(),
                direction,
            })
        }
        "filter" => match rest.split_once(char::is_whitespace) {
            Some((field, value)) => Command::Intent(Intent::UpdateResultsFilter(FilterUpdate::Toggle {
                field: field.to_string(),
                value: match value.trim() {
                    "?" => GroupKey::Unknown,
                    value => GroupKey::from(value),
                },
            })),
            None if rest == "clear" => Command::Intent(Intent::UpdateResultsFilter(FilterUpdate::ClearAll)),
            None => bail!("filter needs a field and a value"),
        },
        "group" => match required(rest, "field")? {
            "none" => Command::Intent(Intent::SetGroupBy(None)),
            field => Command::Intent(Intent::SetGroupBy(Some(field.to_string()))),
        },
        "analysis" => Command::Intent(if switch(rest)? {
            Intent::OpenAnalysisView
        } else {
            Intent::CloseAnalysisView
        }),
        "heat" => Command::Intent(Intent::SetHeatMap(switch(rest)?)),
        "format" => Command::Intent(Intent::UpdateResultFormat(match rest {
            "table" => ResultFormat::Table,
            "other" | "list" => ResultFormat::Other,
            other => bail!("unknown format '{other}'"),
        })),
        "tab" => Command::Intent(Intent::SelectTab(view_kind(rest)?)),
        "width" => Command::Width(rest.parse().map_err(|_| anyhow!("width must be a number of pixels"))?),
        "freeze" => Command::Freeze(view_kind(rest)?, true),
        "thaw" => Command::Freeze(view_kind(rest)?, false),
        "clear" => Command::Intent(Intent::ClearResults),
        "show" => Command::Show,
        "errors" => Command::Errors,
        "help" | "?" => Command::Help,
        "quit" | "exit" => Command::Quit,
        other => bail!("unknown command '{other}', try 'help'"),
    };
    Ok(Some(command))
}

fn required<'a>(rest: &'a str, what: &str) -> Result<&'a str> {
    if rest.is_empty() {
        bail!("missing {what}");
    }
    Ok(rest)
}

fn switch(rest: &str) -> Result<bool> {
    match rest {
        "on" | "open" => Ok(true),
        "off" | "close" => Ok(false),
        other => bail!("expected on or off, got '{other}'"),
    }
}

fn view_kind(rest: &str) -> Result<ViewKind> {
    match rest {
        "table" => Ok(ViewKind::Table),
        "map" => Ok(ViewKind::Map),
        "chart" | "statistics" => Ok(ViewKind::Chart),
        other => bail!("unknown view '{other}'"),
    }
}
