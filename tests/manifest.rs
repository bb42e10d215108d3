use std::fs;

use assert_matches::assert_matches;
use camino::{Utf8Path, Utf8PathBuf};

use nemo_ingest::app::{App, ValidateOptions};
use nemo_ingest::config::{Config, ConfigLoader};
use nemo_ingest::error::IngestError;
use nemo_ingest::manifest::{ALL_FIELDS, read_manifest};

const CHECKSUM: &str = "0123456789abcdef0123456789ABCDEF";

struct Workspace {
    _dir: tempfile::TempDir,
    root: Utf8PathBuf,
}

impl Workspace {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
        fs::write(
            root.join("cv.json"),
            r#"{"Program": ["biccn", "scorch"], "Access": ["open", "controlled"], "Species": ["human", "mouse"]}"#,
        )
        .unwrap();
        fs::write(
            root.join("ic_forms.json"),
            r#"{"IC-01": {"AIBS_proj": {"human_mop": ["HMB"]}}}"#,
        )
        .unwrap();
        fs::write(
            root.join("buckets.json"),
            r#"{"bucket_list": [{"name": "aibs-hmb"}]}"#,
        )
        .unwrap();
        Self { _dir: dir, root }
    }

    fn app(&self) -> App {
        self.app_from(
            r#"{"controlled_vocabulary": "cv.json", "ic_form_mapping": "ic_forms.json", "restricted_buckets": "buckets.json", "error_report_limit": 2}"#,
        )
    }

    fn app_from(&self, json: &str) -> App {
        let config: Config = serde_json::from_str(json).unwrap();
        let resolved = ConfigLoader::resolve_config(config, &self.root).unwrap();
        App::from_config(Some(resolved), None).unwrap()
    }

    fn manifest(&self, name: &str, rows: &[Vec<(&str, &str)>]) -> Utf8PathBuf {
        let mut text = ALL_FIELDS.join("\t");
        text.push('\n');
        for overrides in rows {
            let values: Vec<&str> = ALL_FIELDS
                .iter()
                .map(|column| {
                    overrides
                        .iter()
                        .find(|(key, _)| key == column)
                        .map(|(_, value)| *value)
                        .unwrap_or_else(|| default_value(column))
                })
                .collect();
            text.push_str(&values.join("\t"));
            text.push('\n');
        }
        let path = self.root.join(name);
        fs::write(&path, text).unwrap();
        path
    }
}

fn default_value(column: &str) -> &'static str {
    match column {
        "Sample_ID" => "S1",
        "Program" => "BICCN",
        "Sub-program" => "U19",
        "Lab" => "Zeng",
        "Species" => "Human",
        "Modality" => "Transcriptomics",
        "Technique" => "10x chromium 3' v3 sequencing",
        "Subspecimen_type" => "Cells",
        "Data_type" => "Raw",
        "File_type" => "fastq",
        "Access" => "open",
        "Checksum" => CHECKSUM,
        _ => "",
    }
}

const MANIFEST: &str = "manifest-2024-03-05-10:11:12-AbC1234.tsv";

#[test]
fn valid_submission_report() {
    let ws = Workspace::new();
    let path = ws.manifest(
        MANIFEST,
        &[
            vec![("File_name", "s_R1.fastq.gz")],
            vec![("File_name", "s_R2.fastq.gz")],
        ],
    );
    let report = ws
        .app()
        .validate(
            &path,
            &ValidateOptions {
                error_dir: Some(ws.root.join("errors")),
                ..Default::default()
            },
        )
        .unwrap();

    assert!(report.result);
    assert_eq!(report.submission_id.as_deref(), Some("AbC1234"));
    assert_eq!(report.program, "biccn");
    assert_eq!(report.error_count, 0);
    assert!(report.complete_errors);
    assert_eq!(report.bundles.len(), 1);
    assert_eq!(report.bundles[0].state, "VALID");

    let error_path = report.error_path.unwrap();
    assert_eq!(fs::read_to_string(error_path).unwrap(), "No errors");
}

#[test]
fn invalid_submission_writes_every_error() {
    let ws = Workspace::new();
    let path = ws.manifest(
        MANIFEST,
        &[
            vec![("File_name", "a_R2.fastq.gz"), ("Checksum", "")],
            vec![("File_name", "b.bam"), ("Species", "Yeti")],
            vec![("File_name", "notes.docx")],
        ],
    );
    let errors_dir = ws.root.join("errors");
    let report = ws
        .app()
        .validate(
            &path,
            &ValidateOptions {
                error_dir: Some(errors_dir.clone()),
                dry_run: true,
                ..Default::default()
            },
        )
        .unwrap();

    assert!(!report.result);
    assert!(report.dryrun);
    assert_eq!(report.errors.len(), 2);
    assert!(!report.complete_errors);
    assert!(report.error_count > 2);

    let stored = fs::read_to_string(errors_dir.join(format!("{MANIFEST}.errors"))).unwrap();
    assert_eq!(stored.lines().count(), report.error_count);
    assert!(stored.contains("invalid controlled vocabulary term 'Yeti' for field 'Species'"));
    assert!(stored.contains("Cannot determine an appropriate filetype for file notes.docx"));
    assert!(stored.contains("Missing FASTQ_READ1 subtype file."));
}

#[test]
fn controlled_biccn_runs_restricted_checks() {
    let ws = Workspace::new();
    let restricted = [
        ("Access", "controlled"),
        ("CA_IC_id", "IC-01"),
        ("BCDC_Project", "AIBS_proj"),
        ("BCDC_collection", "human_mop"),
    ];
    let mut good = restricted.to_vec();
    good.extend([("File_name", "s.bam"), ("CA_usage", "HMB")]);
    let path = ws.manifest(MANIFEST, &[good]);
    let report = ws.app().validate(&path, &ValidateOptions::default()).unwrap();
    assert!(report.result, "{:?}", report.errors);

    let mut bad = restricted.to_vec();
    bad.extend([("File_name", "s.bam"), ("CA_usage", "GRU")]);
    let path = ws.manifest(MANIFEST, &[bad]);
    let report = ws.app().validate(&path, &ValidateOptions::default()).unwrap();
    assert_eq!(
        report.errors,
        ["The 'CA_usage' value 'GRU' does not map to the provided 'BCDC_collection' value 'human_mop'."]
    );
}

#[test]
fn unreadable_manifests_abort() {
    let ws = Workspace::new();
    assert_matches!(
        ws.app().validate(Utf8Path::new("/no/such/manifest.tsv"), &ValidateOptions::default()),
        Err(IngestError::ManifestNotFound(name)) if name == "manifest.tsv"
    );

    let binary = ws.root.join("binary.tsv");
    fs::write(&binary, [0xff, 0xfe, 0x00, 0x41]).unwrap();
    assert_matches!(read_manifest(&binary, false), Err(IngestError::ManifestEncoding));

    let bad_header = ws.root.join("header.tsv");
    fs::write(&bad_header, "File_name\tSample_ID\na.bam\tS1\n").unwrap();
    assert_matches!(read_manifest(&bad_header, false), Err(IngestError::ManifestHeader));
}

#[test]
fn missing_vocabulary_is_reported() {
    assert_matches!(App::from_config(None, None), Err(IngestError::MissingConfig));
    assert_matches!(
        App::from_config(Some(Default::default()), None),
        Err(IngestError::MissingVocabulary)
    );
}

#[test]
fn valid_bundles_get_release_urls() {
    let ws = Workspace::new();
    let path = ws.manifest(
        MANIFEST,
        &[
            vec![("File_name", "s_R1.fastq.gz")],
            vec![("File_name", "s_R2.fastq.gz")],
        ],
    );
    let location = "biccn/u19/zeng/transcriptomics/cells/10x_chromium_3'_v3_sequencing/human/raw";
    let release = ws.root.join("archive/open/release").join(location);
    fs::create_dir_all(&release).unwrap();
    fs::write(release.join("s.fastq.tar"), b"released before").unwrap();

    let app = ws.app_from(
        r#"{"controlled_vocabulary": "cv.json", "archive_root": "archive", "public_url_base": "https://downloads.example.org/"}"#,
    );
    let report = app.validate(&path, &ValidateOptions::default()).unwrap();

    assert!(report.result);
    let bundle = &report.bundles[0];
    assert_eq!(
        bundle.release_path.as_deref(),
        Some(release.join("s.v2.fastq.tar").as_str())
    );
    assert_eq!(
        bundle.public_url,
        Some(format!("https://downloads.example.org/{location}/s.v2.fastq.tar"))
    );

    let report = ws.app().validate(&path, &ValidateOptions::default()).unwrap();
    assert_eq!(report.bundles[0].public_url, None);
    assert_eq!(report.bundles[0].release_path, None);
}
