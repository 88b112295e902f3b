mod common;

use anyhow::Result;
use cert_merge::{CertificateEngine, JobSettings, LocalStorage, Placeholder, RendererKind};
use common::{file_names, page_texts, write_csv, write_template, UPPER_CASE_HEADER};
use tempfile::TempDir;

fn substitution_settings(
    template: &std::path::Path,
    csv: &std::path::Path,
    out: &std::path::Path,
) -> JobSettings {
    JobSettings::new(
        template.display().to_string(),
        csv.display().to_string(),
        out.display().to_string(),
    )
    .with_renderer(RendererKind::Substitution)
}

#[tokio::test]
async fn test_tokens_are_replaced_in_place() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let template = write_template(temp_dir.path(), 2);
    let csv = write_csv(
        temp_dir.path(),
        &format!(
            "{}Alice,Rust 101,Systems,Dr. Lee,Prof. Kim\nBob,Rust 101,Networks,Dr. Lee,Prof. Kim\n",
            UPPER_CASE_HEADER
        ),
    );
    let out = temp_dir.path().join("out");

    let engine = CertificateEngine::new(
        LocalStorage::new(&out),
        substitution_settings(&template, &csv, &out),
    );
    let report = engine.run().await?;

    assert!(report.is_success());
    assert_eq!(report.renderer, "substitution");
    assert_eq!(file_names(&out), vec!["Alice.pdf", "Bob.pdf"]);

    let pages = page_texts(&out.join("Bob.pdf"));
    assert_eq!(pages.len(), 2);
    for text in &pages {
        assert!(text.contains("(Bob) Tj"));
        assert!(text.contains("(Networks) Tj"));
        assert!(text.contains("(Prof. Kim) Tj"));
        for placeholder in Placeholder::ALL {
            assert!(!text.contains(placeholder.token()));
        }
    }

    Ok(())
}

#[tokio::test]
async fn test_values_with_parentheses_stay_valid() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let template = write_template(temp_dir.path(), 1);
    let csv = write_csv(
        temp_dir.path(),
        &format!(
            "{}Carol (Chair),Rust 101,Systems,Dr. Lee,Prof. Kim\n",
            UPPER_CASE_HEADER
        ),
    );
    let out = temp_dir.path().join("out");

    let engine = CertificateEngine::new(
        LocalStorage::new(&out),
        substitution_settings(&template, &csv, &out),
    );
    engine.run().await?;

    let pages = page_texts(&out.join("Carol_(Chair).pdf"));
    assert!(pages[0].contains("(Carol \\(Chair\\)) Tj"));

    Ok(())
}

#[tokio::test]
async fn test_title_case_sheet_fails_every_row() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let template = write_template(temp_dir.path(), 1);
    let csv = write_csv(
        temp_dir.path(),
        "Participant,Workshop,Area,Director,President\nAlice,Rust 101,Systems,Dr. Lee,Prof. Kim\n",
    );
    let out = temp_dir.path().join("out");

    let engine = CertificateEngine::new(
        LocalStorage::new(&out),
        substitution_settings(&template, &csv, &out),
    );
    let report = engine.run().await?;

    assert_eq!(report.failed.len(), 1);
    assert!(report.failed[0].message.contains("PARTICIPANT"));
    assert!(file_names(&out).is_empty());

    Ok(())
}
