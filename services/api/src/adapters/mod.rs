pub mod audio_store;
pub mod chat_llm;
pub mod db;
pub mod sst;
pub mod subscription;
pub mod tts;
