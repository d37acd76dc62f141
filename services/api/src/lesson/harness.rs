//! services/api/src/lesson/harness.rs
//!
//! Test doubles for the lesson pipeline: an in-memory `DatabaseService`, a
//! scriptable chat model, and canned speech/subscription/storage services.
//! Everything runs behind the same ports the real adapters implement, so the
//! pipeline under test is byte-for-byte the production code path.

use crate::lesson::{params::GenerationRequest, LessonDeps};
use async_trait::async_trait;
use lingua_core::domain::{ChatMessage, ChatSession, Lesson, Module, SkillType, SubscriptionStatus};
use lingua_core::ports::{
    AudioStorageService, ChatModelService, DatabaseService, PortError, PortResult,
    SpeechToTextService, SubscriptionService, TextToSpeechService,
};
use std::collections::HashMap;
use std::ops::Deref;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

pub const COMPREHENSION_JSON: &str = r#"{
    "comprehension": "Am Wochenende war Lena auf dem Markt und hat frisches Gemüse gekauft.",
    "questions": ["Wer war auf dem Markt?", "Wann war sie dort?", "Was hat sie gekauft?", "Was bedeutet 'frisch'?"]
}"#;

pub const TASK_JSON: &str =
    r#"{"prompt": "Du bist neu in der Stadt. Frag nach dem Weg und erzähl, woher du kommst."}"#;

/// The transcript the canned speech-to-text double returns for any audio.
pub const TRANSCRIPT: &str = "Hallo, ich möchte einen Kaffee bestellen.";

/// A valid generation request for a medium-length exercise.
pub fn request() -> GenerationRequest {
    GenerationRequest {
        topic: "Umweltschutz".to_string(),
        level: "B1".to_string(),
        formality: "neutral".to_string(),
        style: "newspaper article".to_string(),
        language: "german".to_string(),
        writing_type: Some("email".to_string()),
        word_count: 150,
    }
}

//=========================================================================================
// Scriptable Chat Model
//=========================================================================================

type ChatScript = dyn Fn(&str, &[ChatMessage], bool) -> PortResult<String> + Send + Sync;

/// A `ChatModelService` driven by a closure over the system prompt, the
/// history, and whether JSON output was requested.
#[derive(Clone)]
pub struct FnChat {
    script: Arc<ChatScript>,
}

impl FnChat {
    pub fn with(
        script: impl Fn(&str, &[ChatMessage], bool) -> PortResult<String> + Send + Sync + 'static,
    ) -> Self {
        FnChat {
            script: Arc::new(script),
        }
    }

    /// Returns the same canned response for every call.
    pub fn always(response: &'static str) -> Self {
        FnChat::with(move |_, _, _| Ok(response.to_string()))
    }

    /// Fails every call with an `UpstreamGeneration` error.
    pub fn failing(message: &'static str) -> Self {
        FnChat::with(move |_, _, _| Err(PortError::UpstreamGeneration(message.to_string())))
    }

    /// Serves a well-formed generation payload for each skill, except the
    /// listed skills, whose calls fail. The skill is recovered from the
    /// system prompt each generator sends.
    pub fn per_skill(failing: &[SkillType]) -> Self {
        let failing = failing.to_vec();
        FnChat::with(move |system, _, _| {
            let skill = skill_from_system(system);
            if let Some(skill) = skill {
                if failing.contains(&skill) {
                    return Err(PortError::UpstreamGeneration(format!(
                        "scripted failure for {}",
                        skill
                    )));
                }
            }
            match skill {
                Some(SkillType::Reading) | Some(SkillType::Listening) => {
                    Ok(COMPREHENSION_JSON.to_string())
                }
                _ => Ok(TASK_JSON.to_string()),
            }
        })
    }
}

fn skill_from_system(system: &str) -> Option<SkillType> {
    if system.contains("reading comprehension") {
        Some(SkillType::Reading)
    } else if system.contains("listening content") {
        Some(SkillType::Listening)
    } else if system.contains("writing tasks") {
        Some(SkillType::Writing)
    } else if system.contains("speaking tasks") {
        Some(SkillType::Speaking)
    } else {
        None
    }
}

#[async_trait]
impl ChatModelService for FnChat {
    async fn complete(&self, system: &str, history: &[ChatMessage]) -> PortResult<String> {
        (self.script)(system, history, false)
    }

    async fn complete_json(&self, system: &str, history: &[ChatMessage]) -> PortResult<String> {
        (self.script)(system, history, true)
    }
}

//=========================================================================================
// In-Memory Database
//=========================================================================================

#[derive(Default)]
struct MemoryStore {
    lessons: HashMap<Uuid, Lesson>,
    modules: HashMap<Uuid, Module>,
    // Insertion order doubles as created_at order for findOne semantics.
    sessions: Vec<ChatSession>,
    saved: Vec<(Uuid, Uuid)>,
}

/// An in-memory `DatabaseService` with the same document semantics as the
/// Postgres adapter: whole-document writes, set-semantics saved lessons.
#[derive(Default)]
pub struct MemoryDb {
    store: Mutex<MemoryStore>,
}

impl MemoryDb {
    pub fn module_count(&self) -> usize {
        self.store.lock().unwrap().modules.len()
    }
}

#[async_trait]
impl DatabaseService for MemoryDb {
    async fn create_lesson(&self, lesson: &Lesson) -> PortResult<()> {
        self.store
            .lock()
            .unwrap()
            .lessons
            .insert(lesson.id, lesson.clone());
        Ok(())
    }

    async fn get_lesson(&self, lesson_id: Uuid) -> PortResult<Lesson> {
        self.store
            .lock()
            .unwrap()
            .lessons
            .get(&lesson_id)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("Lesson {}", lesson_id)))
    }

    async fn update_lesson(&self, lesson: &Lesson) -> PortResult<()> {
        let mut store = self.store.lock().unwrap();
        if !store.lessons.contains_key(&lesson.id) {
            return Err(PortError::NotFound(format!("Lesson {}", lesson.id)));
        }
        store.lessons.insert(lesson.id, lesson.clone());
        Ok(())
    }

    async fn create_module(&self, module: &Module) -> PortResult<()> {
        self.store
            .lock()
            .unwrap()
            .modules
            .insert(module.id, module.clone());
        Ok(())
    }

    async fn get_module(&self, module_id: Uuid) -> PortResult<Module> {
        self.store
            .lock()
            .unwrap()
            .modules
            .get(&module_id)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("Module {}", module_id)))
    }

    async fn update_module(&self, module: &Module) -> PortResult<()> {
        let mut store = self.store.lock().unwrap();
        if !store.modules.contains_key(&module.id) {
            return Err(PortError::NotFound(format!("Module {}", module.id)));
        }
        store.modules.insert(module.id, module.clone());
        Ok(())
    }

    async fn create_chat_session(&self, session: &ChatSession) -> PortResult<()> {
        self.store.lock().unwrap().sessions.push(session.clone());
        Ok(())
    }

    async fn find_chat_session(
        &self,
        module_id: Uuid,
        user_id: Option<Uuid>,
    ) -> PortResult<Option<ChatSession>> {
        let store = self.store.lock().unwrap();
        Ok(store
            .sessions
            .iter()
            .find(|s| s.module_id == module_id && s.user_id == user_id)
            .cloned())
    }

    async fn update_chat_session(&self, session: &ChatSession) -> PortResult<()> {
        let mut store = self.store.lock().unwrap();
        match store.sessions.iter_mut().find(|s| s.id == session.id) {
            Some(slot) => {
                *slot = session.clone();
                Ok(())
            }
            None => Err(PortError::NotFound(format!("Chat session {}", session.id))),
        }
    }

    async fn add_saved_lesson(&self, user_id: Uuid, lesson_id: Uuid) -> PortResult<()> {
        let mut store = self.store.lock().unwrap();
        if !store.saved.contains(&(user_id, lesson_id)) {
            store.saved.push((user_id, lesson_id));
        }
        Ok(())
    }

    async fn remove_saved_lesson(&self, user_id: Uuid, lesson_id: Uuid) -> PortResult<()> {
        self.store
            .lock()
            .unwrap()
            .saved
            .retain(|entry| *entry != (user_id, lesson_id));
        Ok(())
    }

    async fn saved_lessons(&self, user_id: Uuid) -> PortResult<Vec<Lesson>> {
        let store = self.store.lock().unwrap();
        Ok(store
            .saved
            .iter()
            .filter(|(u, _)| *u == user_id)
            .filter_map(|(_, l)| store.lessons.get(l).cloned())
            .collect())
    }
}

//=========================================================================================
// Canned Peripheral Services
//=========================================================================================

struct CannedSst;

#[async_trait]
impl SpeechToTextService for CannedSst {
    async fn transcribe_audio(&self, _audio_data: &[u8]) -> PortResult<String> {
        Ok(TRANSCRIPT.to_string())
    }
}

struct CannedTts;

#[async_trait]
impl TextToSpeechService for CannedTts {
    async fn generate_audio(&self, _text: &str) -> PortResult<Vec<u8>> {
        Ok(vec![0x1a, 0x45, 0xdf, 0xa3])
    }
}

struct StubSubscriptions {
    valid: bool,
}

#[async_trait]
impl SubscriptionService for StubSubscriptions {
    async fn check(&self, _user_id: Uuid) -> PortResult<SubscriptionStatus> {
        Ok(if self.valid {
            SubscriptionStatus::active()
        } else {
            SubscriptionStatus::inactive("No active subscription found")
        })
    }
}

struct MemoryAudioStore;

#[async_trait]
impl AudioStorageService for MemoryAudioStore {
    async fn store_audio(&self, file_name: &str, _bytes: &[u8]) -> PortResult<String> {
        Ok(format!("http://test.local/uploads/{}", file_name))
    }
}

//=========================================================================================
// Assembled Dependencies
//=========================================================================================

/// A `LessonDeps` built over the in-memory doubles, with direct access to the
/// backing store for assertions.
pub struct TestDeps {
    inner: LessonDeps,
    mem: Arc<MemoryDb>,
}

impl TestDeps {
    pub fn module_count(&self) -> usize {
        self.mem.module_count()
    }
}

impl Deref for TestDeps {
    type Target = LessonDeps;

    fn deref(&self) -> &LessonDeps {
        &self.inner
    }
}

/// Dependencies with the given chat script and an unsubscribed caller.
pub fn scripted_deps(chat: FnChat) -> TestDeps {
    scripted_deps_with_subscription(chat, false)
}

/// Dependencies with the given chat script and a fixed subscription verdict.
pub fn scripted_deps_with_subscription(chat: FnChat, subscribed: bool) -> TestDeps {
    let mem = Arc::new(MemoryDb::default());
    let inner = LessonDeps {
        db: mem.clone(),
        chat: Arc::new(chat),
        sst: Arc::new(CannedSst),
        tts: Arc::new(CannedTts),
        subscriptions: Arc::new(StubSubscriptions { valid: subscribed }),
        audio_store: Arc::new(MemoryAudioStore),
    };
    TestDeps { inner, mem }
}
