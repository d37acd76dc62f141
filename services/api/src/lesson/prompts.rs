//! services/api/src/lesson/prompts.rs
//!
//! Prompt templates for exercise generation, grading, and the speaking
//! conversation. Placeholders are substituted with `str::replace`; every
//! template pins the output language and, where the caller parses the
//! result, demands raw JSON with an exact structure.

pub const READING_SYSTEM: &str =
    "You are a helpful assistant that generates reading comprehension material for language learners.";

pub const READING_PROMPT: &str = r#"You are a language education assistant helping learners improve their reading comprehension.

Generate a reading comprehension paragraph followed by exactly four related comprehension questions.

Follow these instructions strictly:
1. Topic: base the content on "{topic}" and stay focused on it throughout.
2. Learner level: write at a level appropriate for "{level}" learners; avoid vocabulary or constructions beyond that stage.
3. Tone: use a "{formality}" tone.
4. Style: write in the style of a "{style}".
5. Length: the paragraph should contain approximately {word_count} words (within ±10%).
6. Language: the entire output — paragraph and questions — must be written in "{language}". Do not use any other language.
7. Questions: exactly 4 comprehension questions in "{language}", each testing a different aspect (main idea, factual detail, inference, vocabulary in context). Do not generate answers.

Return the output strictly as a valid JSON object matching exactly this structure:

{
  "comprehension": "Your generated paragraph here...",
  "questions": [
    "Question 1 in {language}",
    "Question 2 in {language}",
    "Question 3 in {language}",
    "Question 4 in {language}"
  ]
}

Do not include explanations, titles, Markdown formatting, or code blocks. Output must be raw JSON, ready to be parsed by code."#;

pub const LISTENING_SYSTEM: &str = "You are a language assistant who generates listening content and comprehension questions in {language}. Only use {language} — do not switch or explain.";

pub const LISTENING_PROMPT: &str = r#"You are a helpful assistant that creates listening-focused content for language learners.

Your task:
- Generate a spoken-style paragraph of at least 100 words on the topic: "{topic}"
- It should be suitable for a learner at "{level}" level
- Use a "{formality}" tone and style: {style}
- The entire response must be strictly in {language} — do not switch languages, do not explain or translate.
- The paragraph should sound natural, as if spoken aloud in {language}

Then, generate 4 comprehension questions based on the paragraph, also written in {language}.

Respond strictly in this JSON format:

{
  "comprehension": "....",
  "questions": [
    "Question 1...",
    "Question 2...",
    "Question 3...",
    "Question 4..."
  ]
}"#;

pub const WRITING_SYSTEM: &str = "You are an assistant that generates writing tasks for language learners in {language}. Always respond in {language}.";

pub const WRITING_PROMPT: &str = r#"You are a skilled language teacher for foreign language learners. Create a clear, engaging writing task for a student at level {level}.

Details:
- Topic: {topic}
- Formality: {formality}
- Style: {style}
- Kind of text the student should produce: {writing_type}
- Expected length of the student's text: about {word_count} words
- Language: {language}

The task should state the situation, what to write, and who the reader is. The task must be written entirely in {language}.

Reply only in JSON format like this:
{
  "prompt": "<Writing task in {language}>"
}"#;

pub const SPEAKING_SYSTEM: &str = "You are an assistant that generates creative speaking tasks for language learners in {language}. Always respond in {language}.";

pub const SPEAKING_PROMPT: &str = r#"You are a skilled language teacher for foreign language learners. Create a creative, open-ended speaking task for a student at level {level}.

Details:
- Topic: {topic}
- Formality: {formality}
- Style (optional): {style}
- Language: {language}

The task should sound natural, encourage spontaneous speech, and invite conversation. Use casual language where appropriate. The task must be written entirely in {language}.

Reply only in JSON format like this:
{
  "prompt": "<Situational or role-based speaking prompt in {language}>"
}"#;

pub const COMPREHENSION_FEEDBACK_SYSTEM: &str =
    "You are a language teacher assistant. Respond strictly in {language}.";

pub const COMPREHENSION_FEEDBACK_PROMPT: &str = r#"You are a helpful language teacher. Analyze a student's answers to a comprehension task.
Respond strictly in "{language}" and return only valid JSON in the format below.

Comprehension passage:
"{passage}"

Questions and student answers:
{pairs}

Now give detailed feedback for each answer, as a JSON array with exactly one entry per question, in the following format only:

[
  {
    "question": "The question text...",
    "answer": "The student's answer...",
    "correct": true,
    "suggestion": "An alternative or improved answer"
  }
]

Rules:
- Respond ONLY in {language} (the "correct" field stays a JSON boolean)
- Do not explain or translate anything
- Do not output anything except valid JSON"#;

pub const WRITING_FEEDBACK_SYSTEM: &str =
    "You are a structured evaluator of {language} writing tasks. Respond only in strict JSON.";

pub const WRITING_FEEDBACK_PROMPT: &str = r#"You are a professional {language} language evaluator.

A student was given the following writing task:
"{task}"

The student submitted this text:
"{submission}"

Evaluate the submission qualitatively and return feedback in this strict JSON format ONLY:
{
  "overall": "4/5 (Good)",
  "evaluation": {
    "Grammar": "Generally correct, minor errors in sentence structure.",
    "Vocabulary": "Used appropriate vocabulary, but limited range.",
    "Structure": "Paragraphs were generally well organized.",
    "Task Achievement": "Addressed all parts of the task.",
    "Register": "Tone matched the requested formality."
  },
  "tips": [
    "Practice common linking phrases to improve flow.",
    "Expand vocabulary related to the topic.",
    "Review word order in subordinate clauses."
  ]
}"#;

pub const TURN_SCORING_SYSTEM: &str = r#"You are a strict evaluator. Analyze ONLY the user's latest response and return JSON scores (1-5) for each category.

Return ONLY valid JSON in this format:
{
  "relevance": number,
  "vocabulary": number,
  "fluency": number,
  "pronunciation": number,
  "structure": number
}"#;

pub const TUTOR_REPLY_SYSTEM: &str =
    "You are a friendly tutor. Respond briefly and naturally to continue the conversation.";

pub const SPEAKING_SUMMARY_SYSTEM: &str =
    "You are a structured evaluator of {language} speaking tasks. Respond only in strict JSON.";

pub const SPEAKING_SUMMARY_PROMPT: &str = r#"You are a professional {language} language evaluator.

A student has completed the following speaking task:
"{task}"

Below is the complete conversation between the student and the AI assistant:
{conversation}

Evaluate the student's performance qualitatively.
Do NOT generate numeric scores — they are already calculated separately.

Return feedback in this strict JSON format ONLY:
{
  "overall": "4/5 (Good)",
  "evaluation": {
    "Pronunciation": "Mostly clear, but watch out for 'r' sounds.",
    "Fluency": "Good, some hesitations when searching for vocabulary.",
    "Grammar": "Generally correct, minor errors in sentence structure.",
    "Response Relevance": "Stayed on topic and answered questions well.",
    "Vocabulary": "Used appropriate vocabulary, but limited range.",
    "Structure": "Sentences were generally well-formed, some errors present."
  },
  "tips": [
    "Practice common linking phrases to improve flow.",
    "Expand vocabulary related to the topic.",
    "Focus on intonation to sound more natural."
  ]
}"#;
