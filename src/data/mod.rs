/// Data layer: core types, loading, filtering, aggregation and export.
///
/// Architecture:
/// ```text
///  .csv (;) / .xlsx bytes
///        │
///        ▼
///   ┌──────────┐
///   │  loader   │  try delimited text, then workbook → Table
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  filter   │  fold FilterSpec stages → filtered Table
///   └──────────┘
///        │
///        ▼
///   ┌───────────┐
///   │ aggregate  │  outcome column → ProportionTable
///   └───────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  export   │  Table → .csv / .xlsx bytes
///   └──────────┘
/// ```

pub mod aggregate;
pub mod error;
pub mod export;
pub mod filter;
pub mod loader;
pub mod model;
pub mod xlsx;
