//! CSV import and export of datasets.

pub mod cells;
mod export;
mod import;

pub use export::{
    export_long_csv,
    export_unified_csv,
    long_csv_paths,
};
pub use import::{
    add_feature_info,
    add_sample_info,
    import_long_csv,
    read_table,
    SampleInfoReport,
    METADATA_AVAILABLE,
};
