use std::fs;
use std::io::{Read, Write};

use camino::{Utf8Path, Utf8PathBuf};
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;

use nemo_ingest::bundle::{Bundle, DestinationProbe};
use nemo_ingest::domain::FileState;
use nemo_ingest::file_entity::FileEntity;
use nemo_ingest::store::Store;

fn temp_root() -> (tempfile::TempDir, Utf8PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
    (dir, root)
}

#[test]
fn layout_paths() {
    let store = Store::new("/nemo");
    let location = Utf8Path::new("biccn/u19/zeng/transcriptomics");
    assert!(
        store
            .validated_dir("open", location)
            .ends_with("open/validated/biccn/u19/zeng/transcriptomics")
    );
    assert!(store.release_dir("open", location).starts_with(store.archive_root()));
}

#[test]
fn write_and_move_atomically() {
    let (_dir, root) = temp_root();
    let source = root.join("in/a.txt");
    Store::write_bytes_atomic(&source, b"payload").unwrap();
    assert_eq!(fs::read(&source).unwrap(), b"payload");

    let dest = root.join("out/nested/a.txt");
    Store::move_file_atomic(&source, &dest).unwrap();
    assert!(!source.exists());
    assert_eq!(fs::read_to_string(&dest).unwrap(), "payload");
}

#[test]
fn store_probes_release_versions() {
    let (_dir, root) = temp_root();
    let store = Store::new(&root);
    let location = Utf8Path::new("biccn/lab");
    let validated = store.validated_dir("open", location);
    let release = store.release_dir("open", location);
    Store::write_bytes_atomic(&release.join("s.bam.tar"), b"v1").unwrap();
    assert!(store.exists(&release.join("s.bam.tar")));

    let member = FileEntity::from_path("s.bam", None)
        .unwrap()
        .with_validated_dir(&validated);
    let mut bundle = Bundle::new(member.bundle_key(), vec![member]);
    let path = bundle.determine_release_path(&store).unwrap();
    assert_eq!(path, release.join("s.v2.bam.tar"));
    assert_eq!(
        bundle.public_url(&store.release_root("open"), "https://data.nemoarchive.org"),
        Some("https://data.nemoarchive.org/biccn/lab/s.v2.bam.tar".to_string())
    );
}

#[test]
fn submitted_file_moves_to_validated_area() {
    let (_dir, root) = temp_root();
    let incoming = root.join("incoming/s.bam");
    Store::write_bytes_atomic(&incoming, b"bam").unwrap();

    let mut file = FileEntity::from_path(&incoming, None)
        .unwrap()
        .with_validated_dir(root.join("open/validated/biccn"));
    file.set_submitted(true).unwrap();
    let checksum = file.stats().unwrap().md5.clone();
    file.validate_checksum(&checksum.to_uppercase()).unwrap();
    assert_eq!(file.state(), FileState::Valid);

    let moved = file.move_to_validated().unwrap();
    assert_eq!(moved, root.join("open/validated/biccn/s.bam"));
    assert_eq!(file.state(), FileState::Validated);
    assert!(!incoming.exists());
}

#[test]
fn csv_is_compressed_on_the_way_to_validated() {
    let (_dir, root) = temp_root();
    let incoming = root.join("incoming/s.csv");
    Store::write_bytes_atomic(&incoming, b"a,b\n1,2\n").unwrap();

    let mut file = FileEntity::from_path(&incoming, None)
        .unwrap()
        .with_validated_dir(root.join("open/validated/biccn"));
    assert_eq!(file.normalized_path(), root.join("incoming/s.csv.gz"));
    file.set_state(FileState::Submitted);
    file.set_state(FileState::Valid);

    let moved = file.move_to_validated().unwrap();
    assert_eq!(moved, root.join("open/validated/biccn/s.csv.gz"));
    assert_eq!(file.path(), moved);
    assert_eq!(file.state(), FileState::Validated);
    assert!(!incoming.exists());
    assert!(!root.join("incoming/s.csv.gz").exists());

    let mut text = String::new();
    GzDecoder::new(fs::File::open(&moved).unwrap())
        .read_to_string(&mut text)
        .unwrap();
    assert_eq!(text, "a,b\n1,2\n");
}

#[test]
fn bed_is_decompressed_in_place() {
    let (_dir, root) = temp_root();
    let incoming = root.join("incoming/a.bed.gz");
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(b"chr1\t0\t10\n").unwrap();
    Store::write_bytes_atomic(&incoming, &encoder.finish().unwrap()).unwrap();

    let mut file = FileEntity::from_path(&incoming, None).unwrap();
    let normalized = file.normalize().unwrap();
    assert_eq!(normalized, root.join("incoming/a.bed"));
    assert_eq!(file.path(), normalized);
    assert_eq!(fs::read_to_string(&normalized).unwrap(), "chr1\t0\t10\n");
    assert!(!incoming.exists());

    // already canonical: nothing to do
    assert_eq!(file.normalize().unwrap(), normalized);
}
