//! Turn engine: runs one inbound message through the guard, the idioms, the
//! extractor, the state machine, and the collaborators.

use crate::completion::{CompletionAdapter, SaveMode, SaveOutcome};
use crate::dedup::DeliveryGuard;
use crate::error::RemedyCoreError;
use crate::extract::FieldExtractor;
use crate::intents::IntentMatcher;
use crate::machine::{Answer, ConversationMachine, Evaluation};
use crate::prompt::ContextBuilder;
use crate::replies;
use crate::sessions::SessionStore;
use crate::state::{JsonlStateStore, StateStore};
use crate::types::{Field, Session};
use chrono::{DateTime, NaiveDate, Utc};
use log::{debug, info, warn};
use remedy_rs_config::{RemedyConfig, SessionsConfig};
use remedy_rs_protocol::{
    CollaboratorError, ComplaintSink, ConversationStep, ImageInput, InboundPayload, InboundTurn,
    PrescriptionData, PrescriptionReader, ReplyGenerator, ReplyRequest, Turn, TurnOutcome,
};
use std::sync::Arc;

/// History entry recorded for an inbound photo.
const IMAGE_PLACEHOLDER: &str = "[Imagen de fórmula médica]";

/// Replies and flags gathered while processing one turn.
struct TurnReplies {
    replies: Vec<String>,
    unreadable: bool,
    history_window: usize,
}

impl TurnReplies {
    fn new(history_window: usize) -> Self {
        Self {
            replies: Vec::new(),
            unreadable: false,
            history_window,
        }
    }

    /// Record an inbound user turn in the session history.
    fn heard(&self, session: &mut Session, text: &str) {
        session.record_turn(Turn::user(text), self.history_window);
    }

    /// Queue a reply and record it in the session history.
    fn say(&mut self, session: &mut Session, text: impl Into<String>) {
        let text = text.into();
        session.record_turn(Turn::assistant(text.clone()), self.history_window);
        self.replies.push(text);
    }
}

/// Builder for [`ComplaintEngine`].
pub struct ComplaintEngineBuilder {
    config: RemedyConfig,
    reader: Option<Arc<dyn PrescriptionReader>>,
    generator: Option<Arc<dyn ReplyGenerator>>,
    sink: Option<Arc<dyn ComplaintSink>>,
    state_store: Option<Arc<dyn StateStore>>,
}

impl ComplaintEngineBuilder {
    pub fn reader(mut self, reader: Arc<dyn PrescriptionReader>) -> Self {
        self.reader = Some(reader);
        self
    }

    pub fn generator(mut self, generator: Arc<dyn ReplyGenerator>) -> Self {
        self.generator = Some(generator);
        self
    }

    pub fn sink(mut self, sink: Arc<dyn ComplaintSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Override the persistent session backend. Without one, a JSONL store
    /// is created when `sessions.enabled` is set.
    pub fn state_store(mut self, state_store: Arc<dyn StateStore>) -> Self {
        self.state_store = Some(state_store);
        self
    }

    pub fn build(self) -> Result<ComplaintEngine, RemedyCoreError> {
        let reader = self
            .reader
            .ok_or(RemedyCoreError::MissingCollaborator("prescription reader"))?;
        let generator = self
            .generator
            .ok_or(RemedyCoreError::MissingCollaborator("reply generator"))?;
        let sink = self
            .sink
            .ok_or(RemedyCoreError::MissingCollaborator("complaint sink"))?;
        let config = self.config;
        debug!(
            "engine config (history_window={}, sessions={}, sink={})",
            config.conversation.history_window, config.sessions.enabled, sink.name()
        );

        let state_store = match self.state_store {
            Some(store) => Some(store),
            None if config.sessions.enabled => Some(build_default_state_store(&config.sessions)?),
            None => None,
        };

        let engine = ComplaintEngine {
            sessions: SessionStore::new(state_store),
            guard: DeliveryGuard::new(&config.conversation),
            intents: IntentMatcher::new()?,
            extractor: FieldExtractor::new(&config.extraction)?,
            machine: ConversationMachine::new(&config.extraction)?,
            context: ContextBuilder::new(config.generator.instructions.clone()),
            completion: CompletionAdapter::new(sink, &config.sink, &config.extraction)?,
            reader,
            generator,
            config: Arc::new(config),
        };
        info!("complaint engine initialized");
        Ok(engine)
    }
}

fn build_default_state_store(
    config: &SessionsConfig,
) -> Result<Arc<dyn StateStore>, RemedyCoreError> {
    let path = config.path.as_deref().ok_or_else(|| {
        RemedyCoreError::State("sessions enabled without a path".to_string())
    })?;
    let store =
        JsonlStateStore::new(path).map_err(|err| RemedyCoreError::State(err.to_string()))?;
    Ok(Arc::new(store))
}

/// Conversation engine for undelivered-medication complaints.
pub struct ComplaintEngine {
    config: Arc<RemedyConfig>,
    sessions: SessionStore,
    guard: DeliveryGuard,
    intents: IntentMatcher,
    extractor: FieldExtractor,
    machine: ConversationMachine,
    context: ContextBuilder,
    completion: CompletionAdapter,
    reader: Arc<dyn PrescriptionReader>,
    generator: Arc<dyn ReplyGenerator>,
}

impl ComplaintEngine {
    pub fn builder(config: &RemedyConfig) -> ComplaintEngineBuilder {
        ComplaintEngineBuilder {
            config: config.clone(),
            reader: None,
            generator: None,
            sink: None,
            state_store: None,
        }
    }

    pub fn config(&self) -> &RemedyConfig {
        &self.config
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    /// Clone of a user's session.
    pub async fn snapshot(&self, user_id: &str) -> Result<Option<Session>, RemedyCoreError> {
        self.sessions.snapshot(user_id).await
    }

    /// First contact through the transport's start command: greet and ask for
    /// the prescription.
    pub async fn start(
        &self,
        user_id: &str,
        sender_name: Option<&str>,
    ) -> Result<TurnOutcome, RemedyCoreError> {
        let handle = self.sessions.get_or_create(user_id, Utc::now())?;
        let mut session = handle.lock().await;
        set_display_name(&mut session, sender_name);
        session.greeted = true;
        session.step = ConversationStep::AwaitingPrescription;
        let mut out = TurnReplies::new(self.config.conversation.history_window);
        out.say(&mut session, replies::WELCOME);
        self.sessions.persist(&session)?;
        Ok(outcome(&session, out))
    }

    /// Restart a user's conversation.
    pub async fn reset(&self, user_id: &str) -> Result<TurnOutcome, RemedyCoreError> {
        let handle = self.sessions.reset(user_id, Utc::now()).await?;
        let mut session = handle.lock().await;
        let mut out = TurnReplies::new(self.config.conversation.history_window);
        out.say(&mut session, replies::RESET);
        self.sessions.persist(&session)?;
        Ok(outcome(&session, out))
    }

    /// Process one inbound message.
    ///
    /// Turns of the same user are serialized by the session lock; the lock is
    /// held across collaborator calls.
    pub async fn handle(&self, turn: InboundTurn) -> Result<TurnOutcome, RemedyCoreError> {
        let handle = self.sessions.get_or_create(&turn.user_id, turn.received_at)?;
        let mut session = handle.lock().await;
        if !self.guard.admit(&mut session, &turn) {
            return Ok(TurnOutcome::suppressed());
        }
        session.touch(turn.received_at);
        set_display_name(&mut session, turn.sender_name.as_deref());

        let mut out = TurnReplies::new(self.config.conversation.history_window);
        let now = turn.received_at;
        match &turn.payload {
            InboundPayload::Text { content } => {
                debug!(
                    "handling text turn (user_id={}, step={}, content_len={})",
                    session.id,
                    session.step,
                    content.len()
                );
                self.handle_text(&mut session, content.trim(), now, &mut out)
                    .await;
            }
            InboundPayload::Image(image) => {
                debug!(
                    "handling image turn (user_id={}, step={}, bytes={})",
                    session.id,
                    session.step,
                    image.bytes.len()
                );
                self.handle_image(&mut session, image, now, &mut out).await;
            }
        }

        self.sessions.persist(&session)?;
        Ok(outcome(&session, out))
    }

    async fn handle_text(
        &self,
        session: &mut Session,
        text: &str,
        now: DateTime<Utc>,
        out: &mut TurnReplies,
    ) {
        if text.is_empty() {
            return;
        }
        let today = now.date_naive();
        out.heard(session, text);

        if !session.greeted
            && self.intents.is_greeting(text)
            && !session.has_prescription()
            && !session.awaiting_consent()
        {
            session.greeted = true;
            session.step = ConversationStep::AwaitingPrescription;
            out.say(session, replies::WELCOME);
            return;
        }

        if self.intents.is_reset(text) {
            session.restart(now);
            info!("reset session (user_id={})", session.id);
            out.say(session, replies::RESET);
            return;
        }

        if self.intents.is_new_complaint(text) {
            self.finalize_before_reset(session).await;
            session.reset_for_new_complaint(now);
            info!(
                "started new complaint (user_id={}, complaint_id={})",
                session.id, session.active_complaint.id
            );
            out.say(session, replies::NEW_COMPLAINT);
            return;
        }

        if session.awaiting_consent() || session.step == ConversationStep::AwaitingConsent {
            self.handle_consent(session, text, out);
            return;
        }

        if !session.has_prescription() && self.intents.is_lost_prescription(text) {
            out.say(session, replies::LOST_PRESCRIPTION);
            return;
        }

        if self.intents.is_history_query(text) {
            let listing = replies::history(&session.prior_complaints);
            out.say(session, listing);
            return;
        }

        if !session.has_prescription()
            && session.step.is_before_prescription()
            && text.chars().count() > 3
            && !text.contains(['/', '?', '¿'])
        {
            session.step = ConversationStep::AwaitingPrescription;
            if session.greeted {
                out.say(session, replies::REQUEST_PRESCRIPTION);
            } else {
                session.greeted = true;
                out.say(session, replies::greeting_with_request());
            }
            return;
        }

        if session.has_prescription()
            && let Some(field) = self.intents.change_request(text)
        {
            self.machine.request_change(session, field);
            out.say(session, replies::change_prompt(field));
            return;
        }

        let written = self.extractor.apply(text, session, today);
        if !written.is_empty() {
            debug!(
                "extracted fields from message (user_id={}, fields={:?})",
                session.id, written
            );
        }

        match self.machine.accept_answer(text, session, today) {
            Answer::Accepted {
                field,
                confirmation,
            } => {
                debug!("accepted answer (user_id={}, field={})", session.id, field);
                match self.machine.evaluate(session) {
                    Evaluation::Ask { field, .. } => {
                        out.say(
                            session,
                            format!("{confirmation}\n\n{}", replies::question(field)),
                        );
                    }
                    Evaluation::Complete { .. } => {
                        let summary = replies::final_summary(session);
                        out.say(session, format!("{confirmation}\n\n{summary}"));
                        self.completion.save(session, SaveMode::Force).await;
                    }
                    Evaluation::AwaitPrescription | Evaluation::AwaitConsent => {
                        out.say(session, confirmation);
                    }
                }
                return;
            }
            Answer::Unresolved(message) => {
                out.say(session, message);
                return;
            }
            Answer::NotAnswered => {}
        }

        if session.has_prescription()
            && (session.fields.all_present() || session.step == ConversationStep::Complete)
            && self.intents.is_farewell(text)
        {
            out.say(session, replies::FAREWELL);
            session.step = ConversationStep::Complete;
            self.completion.save(session, SaveMode::Force).await;
            return;
        }

        if let Evaluation::Complete { newly: true } = self.machine.evaluate(session) {
            let summary = replies::final_summary(session);
            out.say(session, summary);
            self.completion.save(session, SaveMode::Gated).await;
            return;
        }

        self.generate_reply(session, today, out).await;
    }

    fn handle_consent(&self, session: &mut Session, text: &str, out: &mut TurnReplies) {
        if !self.intents.is_affirmative(text) {
            session.pending_prescription = None;
            session.step = ConversationStep::AwaitingPrescription;
            info!("consent declined (user_id={})", session.id);
            out.say(session, replies::CONSENT_DECLINED);
            return;
        }
        session.consent_given = true;
        info!("consent given (user_id={})", session.id);
        match session.pending_prescription.take() {
            Some(prescription) => self.apply_prescription(session, prescription, out),
            None => {
                session.step = ConversationStep::AwaitingPrescription;
                out.say(session, replies::CONSENT_WITHOUT_PRESCRIPTION);
            }
        }
    }

    async fn handle_image(
        &self,
        session: &mut Session,
        image: &ImageInput,
        now: DateTime<Utc>,
        out: &mut TurnReplies,
    ) {
        out.heard(session, IMAGE_PLACEHOLDER);

        if session.step == ConversationStep::Complete {
            self.finalize_before_reset(session).await;
            session.reset_for_new_complaint(now);
            info!(
                "started new complaint from image (user_id={}, complaint_id={})",
                session.id, session.active_complaint.id
            );
        }

        if !session.greeted {
            session.greeted = true;
            let greeting = replies::image_greeting(session.first_name());
            out.say(session, greeting);
        }

        let read = self.reader.read(image).await.and_then(|prescription| {
            if prescription.has_medications() {
                Ok(prescription)
            } else {
                Err(CollaboratorError::NoMedications)
            }
        });
        match read {
            Ok(prescription) => {
                info!(
                    "read prescription (user_id={}, medications={})",
                    session.id,
                    prescription.medications.len()
                );
                if session.consent_given {
                    self.apply_prescription(session, prescription, out);
                } else {
                    session.pending_prescription = Some(prescription);
                    session.step = ConversationStep::AwaitingConsent;
                    out.say(session, replies::CONSENT);
                }
            }
            Err(err) => {
                warn!(
                    "failed to read prescription (user_id={}, media_id={}, err={})",
                    session.id, image.media_id, err
                );
                session.pending_prescription = None;
                session.consent_given = false;
                out.unreadable = true;
                out.say(session, replies::UNREADABLE_PRESCRIPTION);
            }
        }
    }

    /// Apply a consented prescription and ask which medications were missing.
    fn apply_prescription(
        &self,
        session: &mut Session,
        prescription: PrescriptionData,
        out: &mut TurnReplies,
    ) {
        let summary = replies::prescription_summary(&prescription);
        session.fields.clear(Field::MissingMedications);
        session.apply_prescription(prescription);
        session.step = ConversationStep::AwaitingMedications;
        session.asked.mark(Field::MissingMedications);
        out.say(session, summary);
    }

    /// Force-save the current complaint before it is replaced, when it has a
    /// prescription and was not saved yet.
    async fn finalize_before_reset(&self, session: &mut Session) {
        if session.has_prescription() && !session.active_complaint.saved {
            let outcome = self.completion.save(session, SaveMode::Force).await;
            if let SaveOutcome::Failed { reason } = outcome {
                warn!(
                    "dropped unsaved complaint on reset (user_id={}, reason={})",
                    session.id, reason
                );
            }
        }
    }

    async fn generate_reply(&self, session: &mut Session, today: NaiveDate, out: &mut TurnReplies) {
        let request = ReplyRequest {
            context: self.context.build(session),
            history: session
                .recent_history(self.config.conversation.history_window)
                .to_vec(),
        };
        let reply = match self.generator.generate(&request).await {
            Ok(reply) => reply,
            Err(err) => {
                warn!(
                    "failed to generate reply (user_id={}, err={})",
                    session.id, err
                );
                out.say(session, replies::APOLOGY);
                return;
            }
        };
        out.say(session, reply.clone());

        let written = self.extractor.apply_reply(&reply, session, today);
        if !written.is_empty() {
            debug!(
                "extracted fields from reply (user_id={}, fields={:?})",
                session.id, written
            );
        }
        if session.has_prescription() && self.intents.announces_completion(&reply) {
            session.step = ConversationStep::Complete;
            self.completion.save(session, SaveMode::Force).await;
        } else if let Evaluation::Complete { newly: true } = self.machine.evaluate(session) {
            self.completion.save(session, SaveMode::Gated).await;
        }
    }
}

fn set_display_name(session: &mut Session, sender_name: Option<&str>) {
    if let Some(name) = sender_name.map(str::trim).filter(|name| !name.is_empty()) {
        session.display_name = Some(name.to_string());
    }
}

fn outcome(session: &Session, out: TurnReplies) -> TurnOutcome {
    TurnOutcome {
        replies: out.replies,
        step: Some(session.step),
        saved: session.active_complaint.saved,
        suppressed: false,
        prescription_unreadable: out.unreadable,
    }
}
