// src/connectivity/mod.rs
// 声明同级目录下的子模块文件
pub mod csd;
pub mod error;
pub mod metric;
pub mod pipeline;
pub mod plot;
pub mod scheduler;
pub mod settings;
pub mod source;
pub mod spectral;
pub mod taper;
pub mod trial;
// 公开导出这些模块里的结构体，方便外部调用
pub use csd::{compute_trial, pair_csd, CsdAccumulator, PairCsd, TrialOutcome};
pub use error::{ConfigurationError, ConnectivityError, FaultKind, TrialFault};
pub use metric::{finalize, DebiasedSquaredWpli};
pub use pipeline::ConnectivityPipeline;
pub use plot::{render_connectivity_png, PlotStyle};
pub use scheduler::{BatchReport, TrialJob, TrialScheduler};
pub use settings::ConnectivitySettings;
pub use source::{ManualSource, SyntheticSource, TrialSource};
pub use spectral::SpectrumBuilder;
pub use taper::{generate_tapers, TaperSet, WindowType, DEFAULT_HALF_BANDWIDTH};
pub use trial::TrialData;
