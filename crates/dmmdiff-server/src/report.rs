//! Markdown rendering of job results for the check-run body.

use std::fmt::Write as _;

use dmmdiff_diff::DiffStats;

/// Above this many changed maps the per-map counters are left out.
pub const COUNTERS_LIMIT: usize = 100;
/// Above this many changed maps the base-revision viewer link is left out.
pub const BASE_LINK_LIMIT: usize = 50;

/// What happened to one changed map.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EntryResult {
    /// Diffed and stored.
    Diffed {
        stats: DiffStats,
        download_url: String,
    },
    /// Not comparable (the size changed); only the note is shown.
    NotCompared { note: String },
    /// One revision could not be parsed.
    Unparseable { error: String },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MapEntry {
    pub path: String,
    pub result: EntryResult,
}

impl MapEntry {
    pub fn tiles_changed(&self) -> usize {
        match &self.result {
            EntryResult::Diffed { stats, .. } => stats.tiles_changed,
            _ => 0,
        }
    }
}

/// Links and limits shared by every entry of one report.
#[derive(Clone, Debug)]
pub struct ReportContext<'a> {
    pub full_name: &'a str,
    pub base_sha: &'a str,
    pub head_sha: &'a str,
    pub fastdmm_host: Option<&'a str>,
    pub maps_changed: usize,
}

pub fn render_entry(entry: &MapEntry, ctx: &ReportContext<'_>) -> String {
    let mut out = format!("### {}\n\n", entry.path);
    match &entry.result {
        EntryResult::NotCompared { note } => {
            let _ = writeln!(out, "{note}\n");
        }
        EntryResult::Unparseable { error } => {
            let _ = writeln!(out, "Could not parse map: {error}\n");
        }
        EntryResult::Diffed {
            stats,
            download_url,
        } => {
            if let Some(note) = &stats.note {
                let _ = writeln!(out, "{note}\n");
            }
            if ctx.maps_changed <= COUNTERS_LIMIT {
                let _ = writeln!(out, "{} tiles changed", stats.tiles_changed);
                let _ = writeln!(
                    out,
                    "{} movables added, {} movables deleted",
                    stats.movables_added, stats.movables_deleted
                );
                let _ = writeln!(out, "{} turfs changed", stats.turfs_changed);
                let _ = writeln!(out, "{} areas changed", stats.areas_changed);
            }
            let _ = writeln!(out, "Download: [diff]({download_url})");
            if let Some(viewer) = ctx.fastdmm_host {
                out.push_str("FastDMM: ");
                if ctx.maps_changed <= BASE_LINK_LIMIT {
                    let _ = write!(
                        out,
                        "[base repo]({viewer}?repo={}&branch={}&map={download_url}) - ",
                        ctx.full_name, ctx.base_sha
                    );
                }
                let _ = writeln!(
                    out,
                    "[head repo]({viewer}?repo={}&branch={}&map={download_url})",
                    ctx.full_name, ctx.head_sha
                );
            }
            out.push('\n');
        }
    }
    out
}

/// The full check-run text: entries ordered by tiles changed, most first.
pub fn render_report(entries: &[MapEntry], ctx: &ReportContext<'_>) -> String {
    if ctx.maps_changed == 0 {
        return "No maps changed".into();
    }
    let mut sorted: Vec<&MapEntry> = entries.iter().collect();
    sorted.sort_by(|a, b| b.tiles_changed().cmp(&a.tiles_changed()));

    let mut out = String::from("## Maps Changed\n\n");
    for entry in sorted {
        out.push_str(&render_entry(entry, ctx));
    }
    out
}

/// Check-run title for a job that compared `maps_changed` maps.
pub fn check_title(maps_changed: usize) -> String {
    match maps_changed {
        0 => "No maps changed".into(),
        1 => "1 map changed".into(),
        n => format!("{n} maps changed"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(maps_changed: usize, viewer: Option<&'static str>) -> ReportContext<'static> {
        ReportContext {
            full_name: "org/station",
            base_sha: "base",
            head_sha: "head",
            fastdmm_host: viewer,
            maps_changed,
        }
    }

    fn diffed(path: &str, tiles: usize) -> MapEntry {
        MapEntry {
            path: path.into(),
            result: EntryResult::Diffed {
                stats: DiffStats {
                    tiles_changed: tiles,
                    movables_added: 2,
                    movables_deleted: 1,
                    turfs_changed: 3,
                    ..DiffStats::default()
                },
                download_url: format!("http://h/dmm/{tiles}.dmm"),
            },
        }
    }

    #[test]
    fn entry_with_counters_and_links() {
        let text = render_entry(&diffed("a.dmm", 7), &ctx(1, Some("https://fastdmm")));
        assert_eq!(
            text,
            "### a.dmm\n\n\
             7 tiles changed\n\
             2 movables added, 1 movables deleted\n\
             3 turfs changed\n\
             0 areas changed\n\
             Download: [diff](http://h/dmm/7.dmm)\n\
             FastDMM: [base repo](https://fastdmm?repo=org/station&branch=base&map=http://h/dmm/7.dmm) - \
             [head repo](https://fastdmm?repo=org/station&branch=head&map=http://h/dmm/7.dmm)\n\n"
        );
    }

    #[test]
    fn limits_trim_large_reports() {
        let text = render_entry(&diffed("a.dmm", 7), &ctx(75, Some("https://fastdmm")));
        assert!(text.contains("7 tiles changed"));
        assert!(!text.contains("[base repo]"));
        assert!(text.contains("[head repo]"));

        let text = render_entry(&diffed("a.dmm", 7), &ctx(101, None));
        assert!(!text.contains("tiles changed"));
        assert!(!text.contains("FastDMM"));
        assert!(text.contains("Download: [diff]"));
    }

    #[test]
    fn report_sorted_by_tiles_changed() {
        let entries = vec![
            diffed("small.dmm", 1),
            MapEntry {
                path: "broken.dmm".into(),
                result: EntryResult::Unparseable {
                    error: "line 3: grid references undefined key \"x\"".into(),
                },
            },
            diffed("big.dmm", 40),
        ];
        let text = render_report(&entries, &ctx(3, None));
        assert!(text.starts_with("## Maps Changed\n\n### big.dmm"));
        let small = text.find("### small.dmm").unwrap();
        let broken = text.find("### broken.dmm").unwrap();
        assert!(small < broken);
        assert!(text.contains("Could not parse map: line 3"));
    }

    #[test]
    fn empty_report_and_titles() {
        assert_eq!(render_report(&[], &ctx(0, None)), "No maps changed");
        assert_eq!(check_title(0), "No maps changed");
        assert_eq!(check_title(1), "1 map changed");
        assert_eq!(check_title(12), "12 maps changed");
    }
}
