//! End-to-end chain crawls against a local mock server.

use anyhow::{anyhow, Result};
use chapterchain::crawler::text::LINE_SEPARATOR;
use chapterchain::crawler::PageField;
use chapterchain::{crawl, Config, CrawlContext, CrawlError, Crawler, Overrides, Termination};
use mockito::{Mock, Server, ServerGuard};
use std::fs;
use std::path::Path;
use std::time::Duration;
use tempfile::TempDir;

fn config_toml(base: &str, combine: bool) -> String {
    format!(
        r#"
        [requests]
        timeout_s = 5
        delay_ms = 0

        [requests.headers]
        User-Agent = "chapterchain-test"

        [sources.mock]
        baseurl = "{base}"

        [sources.mock.selectors]
        title = "h1.chapter-title"
        contents = "div.chapter-content > p"
        nexturl = "a.next-chapter"

        [serie]
        id = "mock-novel"
        source = "mock"
        starturl = "{base}/novel/1"
        combine_flag = {combine}
        "#,
        base = base,
        combine = combine
    )
}

fn chapter_page(title: &str, paragraphs: &[&str], next: Option<&str>) -> String {
    let body: String = paragraphs
        .iter()
        .map(|p| format!("<p>{}</p>", p))
        .collect();
    let nav = next
        .map(|href| format!(r#"<a class="next-chapter" href="{}">Next</a>"#, href))
        .unwrap_or_default();
    format!(
        r#"<!DOCTYPE html><html><head><title>{title} | Mock</title></head><body>
<h1 class="chapter-title">{title}</h1>
<div class="chapter-content">{body}</div>
<div class="nav"><a class="prev" href="/novel/0">Prev</a>{nav}</div>
</body></html>"#,
        title = title,
        body = body,
        nav = nav
    )
}

fn html_mock(server: &mut ServerGuard, path: &str, html: &str) -> Mock {
    server
        .mock("GET", path)
        .with_status(200)
        .with_header("content-type", "text/html; charset=utf-8")
        .with_body(html)
        .expect(1)
        .create()
}

fn context(server: &ServerGuard, out: &Path, combine: bool) -> Result<CrawlContext> {
    context_with(
        server,
        Overrides {
            basedir: Some(out.to_path_buf()),
            ..Overrides::default()
        },
        combine,
    )
}

fn context_with(server: &ServerGuard, overrides: Overrides, combine: bool) -> Result<CrawlContext> {
    let config: Config = toml::from_str(&config_toml(&server.url(), combine))?;
    Ok(CrawlContext::new(config.resolve(&overrides)?)?)
}

fn paced_context(server: &ServerGuard, out: &Path) -> Result<CrawlContext> {
    context_with(
        server,
        Overrides {
            basedir: Some(out.to_path_buf()),
            delay_ms: Some(2000),
            ..Overrides::default()
        },
        false,
    )
}

#[test]
fn two_page_chain_writes_two_files_and_ends_normally() -> Result<()> {
    let mut server = Server::new();
    let first = html_mock(
        &mut server,
        "/novel/1",
        &chapter_page(
            "Chapter 1: Arrival",
            &["Chapter 1: Arrival", "The train was late."],
            Some("/novel/2"),
        ),
    );
    let second = html_mock(
        &mut server,
        "/novel/2",
        &chapter_page("A New Dawn", &["The sun rose slowly."], None),
    );
    let out = TempDir::new()?;
    let ctx = context(&server, out.path(), true)?;

    let report = crawl(&ctx)?;

    first.assert();
    second.assert();
    assert_eq!(report.termination, Termination::NoLink);
    let series_dir = out.path().join("mock-novel");
    assert_eq!(
        report.pages,
        vec![
            series_dir.join("Chapter_1_Arrival.txt"),
            series_dir.join("A_New_Dawn.txt"),
        ]
    );

    let page1 = format!("## Chapter 1: Arrival{}The train was late.", LINE_SEPARATOR);
    let page2 = format!("## A New Dawn{}The sun rose slowly.", LINE_SEPARATOR);
    assert_eq!(fs::read_to_string(series_dir.join("Chapter_1_Arrival.txt"))?, page1);
    assert_eq!(fs::read_to_string(series_dir.join("A_New_Dawn.txt"))?, page2);
    assert_eq!(
        fs::read_to_string(series_dir.join("mock-novel.txt"))?,
        format!("{}{sep}{}{sep}", page1, page2, sep = LINE_SEPARATOR)
    );

    let files = fs::read_dir(&series_dir)?.count();
    assert_eq!(files, 3, "two pages plus the combined archive");
    Ok(())
}

#[test]
fn without_combine_no_archive_is_written() -> Result<()> {
    let mut server = Server::new();
    let _page = html_mock(
        &mut server,
        "/novel/1",
        &chapter_page("Only Page", &["Some text."], None),
    );
    let out = TempDir::new()?;
    let ctx = context(&server, out.path(), false)?;

    let report = crawl(&ctx)?;

    assert_eq!(report.pages.len(), 1);
    assert!(!out.path().join("mock-novel").join("mock-novel.txt").exists());
    Ok(())
}

#[test]
fn invalid_next_link_ends_as_invalid_link() -> Result<()> {
    let mut server = Server::new();
    let _page = html_mock(
        &mut server,
        "/novel/1",
        &chapter_page("Last Chapter", &["The end."], Some("javascript:void(0)")),
    );
    let out = TempDir::new()?;
    let ctx = context(&server, out.path(), false)?;

    let report = crawl(&ctx)?;

    assert_eq!(
        report.termination,
        Termination::InvalidLink {
            raw: "javascript:void(0)".to_string()
        }
    );
    assert_eq!(report.pages.len(), 1);
    Ok(())
}

#[test]
fn not_found_aborts_with_bad_status_and_no_file() -> Result<()> {
    let mut server = Server::new();
    let _first = html_mock(
        &mut server,
        "/novel/1",
        &chapter_page("Chapter 1", &["Chapter 1", "Text."], Some("/novel/2")),
    );
    let _missing = server.mock("GET", "/novel/2").with_status(404).create();
    let out = TempDir::new()?;
    let ctx = context(&server, out.path(), false)?;

    match crawl(&ctx) {
        Err(CrawlError::BadStatus { status, url, .. }) => {
            assert_eq!(status, 404);
            assert!(url.ends_with("/novel/2"));
        }
        other => return Err(anyhow!("expected BadStatus, got {:?}", other)),
    }
    let names: Vec<String> = fs::read_dir(out.path().join("mock-novel"))?
        .filter_map(|e| e.ok())
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names, vec!["Chapter_1.txt".to_string()]);
    Ok(())
}

#[test]
fn existing_output_aborts_with_collision_and_keeps_contents() -> Result<()> {
    let mut server = Server::new();
    let _page = html_mock(
        &mut server,
        "/novel/1",
        &chapter_page("Chapter 1", &["Chapter 1", "New text."], Some("/novel/2")),
    );
    let out = TempDir::new()?;
    let existing = out.path().join("mock-novel").join("Chapter_1.txt");
    fs::create_dir_all(existing.parent().ok_or_else(|| anyhow!("no parent"))?)?;
    fs::write(&existing, "from an earlier run")?;
    let ctx = context(&server, out.path(), false)?;

    match crawl(&ctx) {
        Err(CrawlError::OutputCollision { path }) => assert_eq!(path, existing),
        other => return Err(anyhow!("expected OutputCollision, got {:?}", other)),
    }
    assert_eq!(fs::read_to_string(&existing)?, "from an earlier run");
    Ok(())
}

#[test]
fn page_without_content_aborts_with_extraction_error() -> Result<()> {
    let mut server = Server::new();
    let _page = html_mock(
        &mut server,
        "/novel/1",
        r#"<html><body><h1 class="chapter-title">Chapter 1</h1><div class="comments"><p>hi</p></div></body></html>"#,
    );
    let out = TempDir::new()?;
    let ctx = context(&server, out.path(), false)?;

    match crawl(&ctx) {
        Err(CrawlError::Extraction { field, .. }) => assert_eq!(field, PageField::Content),
        other => return Err(anyhow!("expected Extraction, got {:?}", other)),
    }
    assert!(!out.path().join("mock-novel").exists());
    Ok(())
}

#[test]
fn pause_runs_between_pages_but_not_after_the_last() -> Result<()> {
    let mut server = Server::new();
    let _first = html_mock(
        &mut server,
        "/novel/1",
        &chapter_page("Chapter 1", &["One."], Some("/novel/2")),
    );
    let _second = html_mock(
        &mut server,
        "/novel/2",
        &chapter_page("Chapter 2", &["Two."], None),
    );
    let out = TempDir::new()?;
    let ctx = paced_context(&server, out.path())?;

    let mut pauses: Vec<Duration> = Vec::new();
    let report = Crawler::with_sleep(&ctx, |d| pauses.push(d)).run()?;

    assert_eq!(report.pages.len(), 2);
    assert_eq!(pauses.len(), 1);
    let ms = pauses[0].as_millis();
    assert!((1000..3000).contains(&ms), "delay {}ms out of range", ms);
    Ok(())
}

#[test]
fn single_page_chain_never_pauses() -> Result<()> {
    let mut server = Server::new();
    let _page = html_mock(
        &mut server,
        "/novel/1",
        &chapter_page("Only Page", &["Text."], Some("javascript:void(0)")),
    );
    let out = TempDir::new()?;
    let ctx = paced_context(&server, out.path())?;

    let mut pauses = 0;
    let report = Crawler::with_sleep(&ctx, |_| pauses += 1).run()?;

    assert_eq!(report.pages.len(), 1);
    assert_eq!(pauses, 0);
    Ok(())
}

#[test]
fn failed_step_does_not_pause() -> Result<()> {
    let mut server = Server::new();
    let _page = html_mock(
        &mut server,
        "/novel/1",
        r#"<html><body><h1 class="chapter-title">Chapter 1</h1></body></html>"#,
    );
    let out = TempDir::new()?;
    let ctx = paced_context(&server, out.path())?;

    let mut pauses = 0;
    let result = Crawler::with_sleep(&ctx, |_| pauses += 1).run();

    assert!(matches!(result, Err(CrawlError::Extraction { .. })));
    assert_eq!(pauses, 0);
    Ok(())
}

#[test]
fn windows_1252_page_is_decoded_before_extraction() -> Result<()> {
    let mut server = Server::new();
    let mut html = b"<html><head><meta charset=\"windows-1252\"></head><body>".to_vec();
    html.extend_from_slice(b"<h1 class=\"chapter-title\">Caf\xE9 Noir</h1>");
    html.extend_from_slice(b"<div class=\"chapter-content\"><p>Le caf\xE9 \xE9tait ferm\xE9.</p></div>");
    html.extend_from_slice(b"</body></html>");
    let _page = server
        .mock("GET", "/novel/1")
        .with_status(200)
        .with_header("content-type", "text/html; charset=windows-1252")
        .with_body(html)
        .create();
    let out = TempDir::new()?;
    let ctx = context(&server, out.path(), false)?;

    let report = crawl(&ctx)?;

    let path = out.path().join("mock-novel").join("Cafe_Noir.txt");
    assert_eq!(report.pages, vec![path.clone()]);
    assert_eq!(
        fs::read_to_string(&path)?,
        format!("## Café Noir{}Le cafe etait ferme.", LINE_SEPARATOR)
    );
    Ok(())
}
