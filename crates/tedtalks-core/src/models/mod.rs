pub mod analysis;
pub mod conversation;

pub use analysis::{
    AnalysisResult, Flag, FlagKind, Keyword, MoodLabel, MoodOverall, Severity, TopicLabel,
    UtteranceMood,
};
pub use conversation::{
    AnalysisStatus, AnalysisView, ClaimTicket, ConversationRecord, FailureInfo, FailureKind,
    Speaker, StatusUpdate, Utterance, check_result_shape,
};
