/// Data layer: loading, typing and filtering of the two input datasets.
///
/// Architecture:
/// ```text
///  historico_activos.parquet        datos_macro.parquet
///            │                              │
///            ▼                              ▼
///      ┌──────────┐                   ┌──────────┐
///      │  loader   │  file → Table    │  loader   │
///      └──────────┘                   └──────────┘
///            │                              │
///            ▼                              ▼
///   ┌───────────────┐              ┌────────────┐
///   │ MarketHistory │ daily rows   │ MacroTable │ country-year rows
///   └───────────────┘              └────────────┘
///            │                              │
///            └──────────┬───────────────────┘
///                       ▼
///                 ┌──────────┐
///                 │  filter   │  country / year / date selection
///                 └──────────┘
/// ```

pub mod countries;
pub mod filter;
pub mod indicators;
pub mod loader;
pub mod market;
pub mod model;
