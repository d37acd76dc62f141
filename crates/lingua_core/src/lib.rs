pub mod domain;
pub mod ports;

pub use domain::{
    ChatMessage, ChatRole, ChatSession, ChatTurn, Lesson, LessonKind, Module, ModuleRef,
    SkillType, SubscriptionStatus, TurnAssistant, TurnScores, TurnUser,
};
pub use ports::{
    AudioStorageService, ChatModelService, DatabaseService, PortError, PortResult,
    SpeechToTextService, SubscriptionService, TextToSpeechService,
};
