//! Server-side HTML for the public pages.
//!
//! Pages are assembled from small string builders. Every value that comes
//! from the database goes through [`escape`], and links are only emitted for
//! `http` and `https` URLs.

use axum::response::Html;

use crate::catalog::{badge_style, Entry, EntryKind, Platform};
use crate::storage::MonthlyCount;

/// Escape text for use in HTML content and quoted attributes.
#[must_use]
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

/// The URL if it is safe to put in an `href` or `src`.
fn safe_url(url: &str) -> Option<&str> {
    let url = url.trim();
    let lower = url.to_ascii_lowercase();
    (lower.starts_with("https://") || lower.starts_with("http://") || url.starts_with('/'))
        .then_some(url)
        .filter(|u| !u.starts_with("//"))
}

const TRACK_SCRIPT: &str = r"<script>
document.querySelectorAll('a[data-track]').forEach(function (link) {
  link.addEventListener('click', function () {
    fetch('/api/track-download/' + encodeURIComponent(link.dataset.track), { method: 'POST' });
  });
});
</script>";

/// Wrap page content in the site layout.
#[must_use]
pub fn layout(title: &str, body: &str) -> Html<String> {
    Html(format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>{title} | ROM Hacks &amp; Ports</title>
<link rel="stylesheet" href="/static/site.css">
</head>
<body class="bg-gray-950 text-gray-100">
<nav class="site-nav">
<a href="/">Home</a>
<a href="/romhacks">ROM Hacks</a>
<a href="/ports">Ports</a>
</nav>
<main>
{body}
</main>
{TRACK_SCRIPT}
</body>
</html>"#,
        title = escape(title),
    ))
}

/// Console badges for an entry.
#[must_use]
pub fn console_badges(entry: &Entry) -> String {
    entry
        .consoles
        .iter()
        .map(|console| {
            format!(
                r#"<span class="badge border {}">{}</span>"#,
                badge_style(entry.kind, console),
                escape(&console.to_uppercase())
            )
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// A card linking to an entry's detail page.
#[must_use]
pub fn entry_card(entry: &Entry, downloads: Option<i64>) -> String {
    let mut html = format!(
        r#"<article class="entry-card"><a href="/game/{id}">"#,
        id = escape(&entry.id)
    );
    if let Some(image) = entry.image_url.as_deref().and_then(safe_url) {
        html.push_str(&format!(
            r#"<img src="{}" alt="" loading="lazy">"#,
            escape(image)
        ));
    }
    html.push_str(&format!("<h3>{}</h3></a>", escape(&entry.title)));
    html.push_str(&console_badges(entry));
    if let Some(author) = &entry.author {
        html.push_str(&format!(r#"<p class="author">by {}</p>"#, escape(author)));
    }
    if let Some(count) = downloads {
        html.push_str(&format!(r#"<p class="downloads">{count} downloads</p>"#));
    }
    html.push_str("</article>");
    html
}

/// A grid of entry cards, or a note when there are none.
#[must_use]
pub fn entry_grid<'a>(
    entries: impl IntoIterator<Item = (&'a Entry, Option<i64>)>,
    empty_note: &str,
) -> String {
    let cards: Vec<String> = entries
        .into_iter()
        .map(|(entry, downloads)| entry_card(entry, downloads))
        .collect();
    if cards.is_empty() {
        format!(r#"<p class="empty">{}</p>"#, escape(empty_note))
    } else {
        format!(r#"<div class="entry-grid">{}</div>"#, cards.concat())
    }
}

/// An ordered list of this month's most downloaded entries.
#[must_use]
pub fn monthly_ranking(rows: &[MonthlyCount]) -> String {
    if rows.is_empty() {
        return r#"<p class="empty">No downloads yet this month.</p>"#.to_string();
    }
    let items: String = rows
        .iter()
        .map(|row| {
            format!(
                r#"<li><a href="/game/{}">{}</a> <span class="downloads">{}</span></li>"#,
                escape(&row.entry_id),
                escape(&row.title),
                row.downloads
            )
        })
        .collect();
    format!(r#"<ol class="ranking">{items}</ol>"#)
}

/// The search and console filter form above a list page.
#[must_use]
pub fn filter_form(action: &str, console: Option<&str>, query: Option<&str>) -> String {
    format!(
        r#"<form class="filters" method="get" action="{action}">
<input type="search" name="q" placeholder="Search" value="{query}">
<input type="text" name="console" placeholder="Console" value="{console}">
<button type="submit">Filter</button>
</form>"#,
        action = escape(action),
        query = escape(query.unwrap_or_default()),
        console = escape(console.unwrap_or_default()),
    )
}

fn fact(html: &mut String, label: &str, value: Option<&str>) {
    if let Some(value) = value.map(str::trim).filter(|v| !v.is_empty()) {
        html.push_str(&format!(
            "<dt>{}</dt><dd>{}</dd>",
            escape(label),
            escape(value)
        ));
    }
}

/// The body of an entry's detail page.
#[must_use]
pub fn entry_detail(entry: &Entry, downloads: i64, monthly_downloads: i64) -> String {
    let mut html = format!(
        r#"<article class="entry-detail"><h1>{}</h1><div class="badges">{}</div>"#,
        escape(&entry.title),
        console_badges(entry)
    );

    if let Some(image) = entry.image_url.as_deref().and_then(safe_url) {
        html.push_str(&format!(
            r#"<img class="cover" src="{}" alt="{}">"#,
            escape(image),
            escape(&entry.title)
        ));
    }

    html.push_str(&format!(
        r#"<p class="downloads">{downloads} downloads, {monthly_downloads} this month</p>"#
    ));

    if let Some(link) = entry.download_link.as_deref().and_then(safe_url) {
        html.push_str(&format!(
            r#"<a class="download" href="{}" data-track="{}" rel="noopener" target="_blank">Download</a>"#,
            escape(link),
            escape(&entry.id)
        ));
    }

    if let Some(description) = &entry.description {
        html.push_str(&format!(
            r#"<section class="description"><p>{}</p></section>"#,
            escape(description).replace('\n', "<br>")
        ));
    }

    if !entry.features.is_empty() {
        let items: String = entry
            .features
            .iter()
            .map(|f| format!("<li>{}</li>", escape(f)))
            .collect();
        html.push_str(&format!("<section><h2>Features</h2><ul>{items}</ul></section>"));
    }

    html.push_str("<section><h2>Details</h2><dl>");
    fact(&mut html, "Author", entry.author.as_deref());
    fact(&mut html, "Version", entry.version.as_deref());
    fact(&mut html, "Released", entry.release_date.as_deref());
    fact(&mut html, "Based on", entry.base_game.as_deref());
    fact(&mut html, "Series", entry.effective_series().as_deref());
    fact(&mut html, "Stage", entry.dev_stage.as_deref());
    if entry.kind == EntryKind::Port {
        fact(&mut html, "Original platform", entry.original_platform.as_deref());
        if entry.online_play {
            fact(&mut html, "Online play", Some("Yes"));
        }
    } else {
        fact(&mut html, "Patch format", entry.patch_format.as_deref());
        fact(&mut html, "Base region", entry.base_rom.region.as_deref());
        fact(&mut html, "Base revision", entry.base_rom.revision.as_deref());
        fact(&mut html, "Header", entry.base_rom.header.as_deref());
        fact(&mut html, "CRC32", entry.base_rom.checksum_crc32.as_deref());
        fact(&mut html, "MD5", entry.base_rom.checksum_md5.as_deref());
        fact(&mut html, "SHA-1", entry.base_rom.checksum_sha1.as_deref());
    }
    html.push_str("</dl></section>");

    html.push_str(&instructions(entry));

    let screenshots: String = entry
        .screenshots
        .iter()
        .filter_map(|url| safe_url(url))
        .map(|url| format!(r#"<img src="{}" alt="" loading="lazy">"#, escape(url)))
        .collect();
    if !screenshots.is_empty() {
        html.push_str(&format!(
            r#"<section class="screenshots"><h2>Screenshots</h2>{screenshots}</section>"#
        ));
    }

    let support = entry.links.labelled();
    if !support.is_empty() {
        let items: String = support
            .into_iter()
            .filter_map(|(label, url)| safe_url(url).map(|url| (label, url)))
            .map(|(label, url)| {
                format!(
                    r#"<li><a href="{}" rel="noopener" target="_blank">{label}</a></li>"#,
                    escape(url)
                )
            })
            .collect();
        html.push_str(&format!("<section><h2>Support</h2><ul>{items}</ul></section>"));
    }

    html.push_str("</article>");
    html
}

fn instructions(entry: &Entry) -> String {
    let mut html = String::new();
    if let Some(text) = entry.instruction_text.as_deref().filter(|t| !t.trim().is_empty()) {
        html.push_str(&format!(
            "<p>{}</p>",
            escape(text).replace('\n', "<br>")
        ));
    }
    for platform in Platform::ALL {
        if let Some(text) = entry.platform_instructions.get(&platform) {
            html.push_str(&format!(
                "<h3>{}</h3><p>{}</p>",
                platform.label(),
                escape(text).replace('\n', "<br>")
            ));
        }
    }
    if let Some(text) = entry.mod_instructions.as_deref().filter(|t| !t.trim().is_empty()) {
        html.push_str(&format!(
            "<h3>Mods</h3><p>{}</p>",
            escape(text).replace('\n', "<br>")
        ));
    }

    if html.is_empty() {
        html
    } else {
        format!(r#"<section class="instructions"><h2>Instructions</h2>{html}</section>"#)
    }
}

/// Body of the page shown for an unknown entry.
#[must_use]
pub fn not_found(id: &str) -> String {
    format!(
        r#"<section class="not-found"><h1>Not found</h1><p>No entry called "{}" exists.</p><a href="/">Back to the catalog</a></section>"#,
        escape(id)
    )
}
