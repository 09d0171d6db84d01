//! Plain-data types exchanged with the host application.
//!
//! Every type here serialises to the camelCase / kebab-case JSON the UI and
//! report layers consume, so a context, a queue, or an execution result can be
//! handed over without translation.

pub mod analysis;
pub mod context;
pub mod protocol;
pub mod record;
pub mod results;
pub mod suggestion;
pub mod variable;

pub use analysis::{
    AnalysisParameters, AnalysisType, ChartType, ExpectedOutputs, MethodCategory,
    MultiplicityMethod, ProposedAnalysis, StatisticalMethod, Tails,
};
pub use context::{
    AnalysisContext, DataContext, LiteratureContext, MissingCount, MissingDataSummary,
    MissingPattern, PaperSummary, ProtocolContext, SchemaContext,
};
pub use protocol::{
    FoundationalPaper, PaperElements, Pico, ProtocolContent, ProtocolMetadata, ProtocolVersion,
    StudyDesign,
};
pub use record::{Record, RecordStatus, TableData};
pub use results::{
    AnalysisExecutionResult, AnalysisResults, CategoricalStats, ContingencyResults,
    ContinuousStats, CorrelationMethod, CorrelationResults, DescriptiveResults, GroupStats,
    NormalityResults, TTestResults,
};
pub use suggestion::{
    AnalysisPatch, FeasibilityIssue, FeasibilityResult, Grounding, IssueKind, Priority,
    ReviewDecision, Severity, Suggestion, SuggestionReview, SuggestionSource, SuggestionStatus,
    SuggestionType,
};
pub use variable::{
    CategoricalSummary, ContinuousSummary, DataType, DistributionSummary, EndpointTier,
    MethodHint, Role, SchemaNode, Variable, VariableKind,
};
