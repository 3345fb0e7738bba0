use std::io::Write;

use itemcat::{
    item_schema, DatasetReader, ModelStore, PipelineError, PipelineExecutor, PipelineSpec,
    TrainerStrategy, FORMAT_VERSION,
};

fn fitted_model(dir: &std::path::Path) -> itemcat::FittedModel {
    let path = dir.join("train.tsv");
    let mut file = std::fs::File::create(&path).unwrap();
    writeln!(file, "1001\tSony Blu-Ray Player\tBlu-Ray player from Sony black").unwrap();
    writeln!(file, "2002\tCotton T-Shirt\tPlain white cotton t-shirt").unwrap();
    let reader = DatasetReader::open(&path, item_schema()).unwrap();
    let spec = PipelineSpec::for_schema(&item_schema(), TrainerStrategy::default());
    PipelineExecutor::fit(&spec, &reader).unwrap()
}

#[test]
fn test_artifact_is_self_describing() {
    let dir = tempfile::tempdir().unwrap();
    let model = fitted_model(dir.path());
    let artifact = dir.path().join("model.bin");
    ModelStore::save(&model, &artifact).unwrap();

    // Loading needs nothing but the artifact: schema, steps, and trainer
    // kind all come back from the file.
    let loaded = ModelStore::load(&artifact).unwrap();
    assert_eq!(loaded.schema(), model.schema());
    assert_eq!(loaded.label_encoder().labels(), ["1001", "2002"]);
    assert_eq!(loaded.classifier().strategy.name(), "sdca");
}

#[test]
fn test_truncated_artifact_is_corrupt() {
    let dir = tempfile::tempdir().unwrap();
    let model = fitted_model(dir.path());
    let artifact = dir.path().join("model.bin");
    ModelStore::save(&model, &artifact).unwrap();

    let bytes = std::fs::read(&artifact).unwrap();
    std::fs::write(&artifact, &bytes[..bytes.len() / 2]).unwrap();

    let err = ModelStore::load(&artifact).unwrap_err();
    assert!(matches!(err, PipelineError::ArtifactCorrupt(_)));
}

#[test]
fn test_newer_version_is_rejected_not_misread() {
    let dir = tempfile::tempdir().unwrap();
    let model = fitted_model(dir.path());
    let artifact = dir.path().join("model.bin");
    ModelStore::save(&model, &artifact).unwrap();

    let contents = std::fs::read_to_string(&artifact).unwrap();
    let future = format!("v{}", FORMAT_VERSION + 1);
    let bumped = contents.replacen(&format!("v{FORMAT_VERSION}"), &future, 1);
    std::fs::write(&artifact, bumped).unwrap();

    let err = ModelStore::load(&artifact).unwrap_err();
    assert!(matches!(
        err,
        PipelineError::ArtifactVersion { found, .. } if found == FORMAT_VERSION + 1
    ));
}

#[test]
fn test_save_overwrites_atomically() {
    let dir = tempfile::tempdir().unwrap();
    let model = fitted_model(dir.path());
    let artifact = dir.path().join("model.bin");

    ModelStore::save(&model, &artifact).unwrap();
    ModelStore::save(&model, &artifact).unwrap();

    assert!(ModelStore::load(&artifact).is_ok());
    assert!(!artifact.with_extension("tmp").exists());
}
