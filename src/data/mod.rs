/// Data layer: core types, ingestion, filtering, and joining.
///
/// Architecture:
/// ```text
///  .xlsx / .csv / .sql / .txt
///        │
///        ▼
///   ┌──────────┐
///   │  loader   │  UploadedFile → Table   (one per upload)
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │   join    │  Table ⋈ Table → Table  (two-file page only)
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  filter   │  per-column predicates from a FilterInput → Table
///   └──────────┘
/// ```

pub mod filter;
pub mod join;
pub mod loader;
pub mod model;
