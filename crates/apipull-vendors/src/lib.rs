//! Concrete vendor adapters and endpoint catalogs
//!
//! - [`truckercloud`]: telematics aggregator with bearer-token auth and
//!   page/size paging driven by body counters
//! - [`fmcsa`]: public Socrata datasets with `$limit`/`$offset` paging and
//!   no counters (fetch until an empty page)
//! - [`jsonq`]: the tiny dotted-path row extractor dependent endpoints use
//!   to turn prior pages into query-parameter rows

pub mod fmcsa;
pub mod jsonq;
pub mod truckercloud;
