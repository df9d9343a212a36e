use super::{profile, AppError, AppState};
use crate::debate::{DebateSession, Transition};
use crate::media::CaptureLease;
use crate::protocol::{format_clock, ParticipantView, RoomView, ServerMessage};
use crate::types::*;
use std::collections::HashMap;

/// A debate session plus everything around it that is not debate logic
#[derive(Debug)]
pub struct DebateRoom {
    pub id: RoomId,
    pub host_id: UserId,
    pub session: DebateSession,
    /// Private notes per participant
    pub notes: HashMap<ParticipantId, String>,
    /// Capture stream of the room's creator
    pub media: Option<CaptureLease>,
    pub media_warning: Option<String>,
    /// Open connections per human
    pub present: HashMap<UserId, usize>,
    /// Consecutive ticks without any open connection
    pub idle_ticks: u32,
    pub created_at: String,
}

impl DebateRoom {
    pub fn is_participant(&self, user_id: &str) -> bool {
        self.session.participant(user_id).is_some()
    }

    /// Everyone's notes in turn order, for the feedback writer
    pub fn combined_notes(&self) -> String {
        self.session
            .participants
            .iter()
            .filter_map(|p| {
                self.notes
                    .get(&p.id)
                    .filter(|text| !text.trim().is_empty())
                    .map(|text| format!("{}: {}", p.name, text.trim()))
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn view(&self) -> RoomView {
        let session = &self.session;
        RoomView {
            id: self.id.clone(),
            host_id: self.host_id.clone(),
            topic: session.topic.clone(),
            phase: session.phase,
            phase_title: session.phase.title().to_string(),
            phase_description: session.phase.description().to_string(),
            current_speaker: session.current_speaker.clone(),
            total_remaining: session.total_remaining,
            phase_remaining: session.phase_remaining,
            total_clock: format_clock(session.total_remaining),
            phase_clock: format_clock(session.phase_remaining),
            participants: session.participants.iter().map(ParticipantView::from).collect(),
            audio_enabled: self.media.as_ref().is_some_and(|m| m.audio_enabled()),
            video_enabled: self.media.as_ref().is_some_and(|m| m.video_enabled()),
            media_warning: self.media_warning.clone(),
            feedback: session.feedback.clone(),
            results: session.results.clone(),
        }
    }

    pub fn is_present(&self, user_id: &str) -> bool {
        self.present.contains_key(user_id)
    }

    /// Drop one connection of `user_id`
    fn disconnect(&mut self, user_id: &str) {
        if let Some(count) = self.present.get_mut(user_id) {
            *count -= 1;
            if *count == 0 {
                self.present.remove(user_id);
            }
        }
    }

    /// Give the capture stream back and clear every video slot
    fn detach_media(&mut self) {
        if let Some(mut lease) = self.media.take() {
            lease.release();
        }
        for p in self.session.participants.iter_mut() {
            p.video_attached = false;
        }
    }
}

impl AppState {
    /// Open a room for `host` with a topic drawn from `categories` and mock opponents
    pub async fn create_room(&self, host: &User, categories: &[String]) -> Result<RoomView, AppError> {
        let selected: Vec<String> = categories
            .iter()
            .filter(|c| is_known_category(c))
            .cloned()
            .collect();
        if selected.is_empty() {
            return Err(AppError::NoCategories);
        }

        let topic = self.content.generate_topic(&selected).await;

        let mut participants = vec![Participant::from_user(host, ParticipantKind::Human)];
        participants.extend(
            profile::mock_opponents(&host.id, self.config.bot_opponents)
                .iter()
                .map(|u| Participant::from_user(u, ParticipantKind::Bot)),
        );
        let mut session = DebateSession::new(topic, participants, self.config.clone());

        let (media, media_warning) = match CaptureLease::acquire(self.capture.clone(), &host.id).await
        {
            Ok(lease) => {
                for p in session.participants.iter_mut() {
                    p.video_attached = true;
                }
                (Some(lease), None)
            }
            Err(e) => {
                tracing::warn!("Room for {} continues without video: {}", host.id, e);
                (None, Some(e.to_string()))
            }
        };

        let room = DebateRoom {
            id: ulid::Ulid::new().to_string(),
            host_id: host.id.clone(),
            session,
            notes: HashMap::new(),
            media,
            media_warning,
            present: HashMap::new(),
            idle_ticks: 0,
            created_at: chrono::Utc::now().to_rfc3339(),
        };

        tracing::info!(
            "Room {} created by {} on {:?}: {}",
            room.id,
            host.id,
            selected,
            room.session.topic
        );

        let view = room.view();
        self.rooms.write().await.insert(room.id.clone(), room);
        Ok(view)
    }

    pub async fn get_room(&self, room_id: &str) -> Option<RoomView> {
        self.rooms.read().await.get(room_id).map(DebateRoom::view)
    }

    /// Enter a room. New participants can only join before the debate starts.
    pub async fn join_room(&self, room_id: &str, user: &User) -> Result<RoomView, AppError> {
        let view = {
            let mut rooms = self.rooms.write().await;
            let room = rooms
                .get_mut(room_id)
                .ok_or_else(|| AppError::RoomNotFound(room_id.to_string()))?;

            if !room.is_participant(&user.id) {
                if room.session.phase != DebatePhase::Waiting {
                    return Err(AppError::AlreadyStarted);
                }
                let mut participant = Participant::from_user(user, ParticipantKind::Human);
                participant.video_attached = room.media.is_some();
                room.session.participants.push(participant);
                tracing::info!("{} joined room {}", user.id, room_id);
            }
            *room.present.entry(user.id.clone()).or_insert(0) += 1;
            room.idle_ticks = 0;
            room.view()
        };

        self.broadcast_to_room(room_id, ServerMessage::RoomState { room: view.clone() });
        Ok(view)
    }

    /// Start the debate. Returns false when it was already running.
    pub async fn start_debate(&self, room_id: &str, user_id: &str) -> Result<bool, AppError> {
        let (started, view) = {
            let mut rooms = self.rooms.write().await;
            let room = rooms
                .get_mut(room_id)
                .ok_or_else(|| AppError::RoomNotFound(room_id.to_string()))?;
            if !room.is_participant(user_id) {
                return Err(AppError::NotParticipant);
            }
            (room.session.start(), room.view())
        };

        if started {
            tracing::info!("Debate in room {} started by {}", room_id, user_id);
            self.broadcast_to_room(room_id, ServerMessage::RoomState { room: view });
        }
        Ok(started)
    }

    /// Advance every running room by one second and discard rooms nobody
    /// connected to within `abandon_secs`. Returns how many rooms ticked.
    pub async fn tick_rooms(&self) -> usize {
        let mut updates = Vec::new();
        let mut voting = Vec::new();

        let abandoned: Vec<DebateRoom> = {
            let mut rooms = self.rooms.write().await;
            let expired: Vec<RoomId> = rooms
                .values_mut()
                .filter_map(|room| {
                    if !room.present.is_empty() {
                        room.idle_ticks = 0;
                        return None;
                    }
                    room.idle_ticks += 1;
                    (room.idle_ticks >= self.config.abandon_secs).then(|| room.id.clone())
                })
                .collect();
            expired.iter().filter_map(|id| rooms.remove(id)).collect()
        };
        for room in abandoned {
            tracing::info!("Room {} abandoned after {}s without connections", room.id, room.idle_ticks);
            // Dropping the room releases its capture stream
            drop(room);
        }

        {
            let mut rooms = self.rooms.write().await;
            for room in rooms.values_mut() {
                if !room.session.phase.is_running() {
                    continue;
                }
                match room.session.tick() {
                    Transition::None => {}
                    Transition::SpeakerChanged { speaker } => {
                        tracing::debug!("Room {}: {} has the floor", room.id, speaker);
                    }
                    Transition::PhaseChanged { phase } => {
                        tracing::info!("Room {} entered {:?}", room.id, phase);
                    }
                    Transition::VotingStarted { forced } => {
                        tracing::info!("Room {} entered voting (clock ran out: {})", room.id, forced);
                        voting.push(room.id.clone());
                    }
                }
                updates.push((room.id.clone(), room.view()));
            }
        }

        let ticked = updates.len();
        for (room_id, view) in updates {
            self.broadcast_to_room(&room_id, ServerMessage::RoomState { room: view });
        }

        for room_id in voting {
            self.cast_bot_ratings(&room_id).await;
            let state = self.clone();
            tokio::spawn(async move {
                state.write_feedback(&room_id).await;
            });
        }

        ticked
    }

    pub async fn update_notes(&self, room_id: &str, user_id: &str, text: String) -> Result<(), AppError> {
        let mut rooms = self.rooms.write().await;
        let room = rooms
            .get_mut(room_id)
            .ok_or_else(|| AppError::RoomNotFound(room_id.to_string()))?;
        if !room.is_participant(user_id) {
            return Err(AppError::NotParticipant);
        }
        room.notes.insert(user_id.to_string(), text);
        Ok(())
    }

    /// Flip the microphone. Returns (audio_enabled, video_enabled).
    pub async fn toggle_mic(&self, room_id: &str, user_id: &str) -> Result<(bool, bool), AppError> {
        self.with_media(room_id, user_id, |lease| {
            lease.toggle_audio();
        })
        .await
    }

    /// Flip the camera. Returns (audio_enabled, video_enabled).
    pub async fn toggle_video(&self, room_id: &str, user_id: &str) -> Result<(bool, bool), AppError> {
        self.with_media(room_id, user_id, |lease| {
            lease.toggle_video();
        })
        .await
    }

    async fn with_media<F>(&self, room_id: &str, user_id: &str, f: F) -> Result<(bool, bool), AppError>
    where
        F: FnOnce(&mut CaptureLease),
    {
        let (state, view) = {
            let mut rooms = self.rooms.write().await;
            let room = rooms
                .get_mut(room_id)
                .ok_or_else(|| AppError::RoomNotFound(room_id.to_string()))?;
            if room.host_id != user_id {
                return Err(AppError::NotMediaOwner);
            }
            let lease = room.media.as_mut().ok_or(AppError::NoCapture)?;
            f(lease);
            let state = (lease.audio_enabled(), lease.video_enabled());
            (state, room.view())
        };

        self.broadcast_to_room(room_id, ServerMessage::RoomState { room: view });
        Ok(state)
    }

    /// Close one connection to a room. The creator's last connection leaving
    /// releases the capture stream; the room is discarded once no human is connected. Returns true when the room closed.
    pub async fn leave_room(&self, room_id: &str, user_id: &str) -> Result<bool, AppError> {
        let (closed, removed) = {
            let mut rooms = self.rooms.write().await;
            let room = rooms
                .get_mut(room_id)
                .ok_or_else(|| AppError::RoomNotFound(room_id.to_string()))?;

            room.disconnect(user_id);
            if room.host_id == user_id && !room.is_present(user_id) {
                room.detach_media();
            }

            if room.present.is_empty() {
                (true, rooms.remove(room_id))
            } else {
                let view = room.view();
                drop(rooms);
                self.broadcast_to_room(room_id, ServerMessage::RoomState { room: view });
                (false, None)
            }
        };

        if closed {
            tracing::info!("Room {} closed after {} left", room_id, user_id);
        }
        // Dropping the room releases anything still held
        drop(removed);
        Ok(closed)
    }

    /// Results seen; leave the room. Ignored before the results are in.
    pub async fn acknowledge_results(&self, room_id: &str, user_id: &str) -> Result<bool, AppError> {
        let phase = self
            .rooms
            .read()
            .await
            .get(room_id)
            .map(|room| room.session.phase)
            .ok_or_else(|| AppError::RoomNotFound(room_id.to_string()))?;

        if phase != DebatePhase::Results {
            return Ok(false);
        }
        self.leave_room(room_id, user_id).await?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::LoopbackCaptureDevice;
    use crate::store::ProfileStore;
    use crate::content::TemplateContentProvider;
    use std::sync::Arc;

    fn state_with_device(device: Arc<LoopbackCaptureDevice>) -> AppState {
        AppState::with_components(
            DebateConfig::default(),
            ProfileStore::with_profiles(profile::mock_users()),
            Arc::new(TemplateContentProvider),
            device,
        )
    }

    async fn alex(state: &AppState) -> User {
        state.profiles.get("user-1").await.unwrap()
    }

    #[tokio::test]
    async fn test_create_room_seats_host_first() {
        let state = AppState::new();
        let host = alex(&state).await;

        let room = state
            .create_room(&host, &["technology".to_string()])
            .await
            .unwrap();

        assert_eq!(room.phase, DebatePhase::Waiting);
        assert_eq!(room.participants.len(), 4);
        assert_eq!(room.participants[0].id, "user-1");
        assert_eq!(room.participants[0].kind, ParticipantKind::Human);
        assert!(room.participants[1..]
            .iter()
            .all(|p| p.kind == ParticipantKind::Bot && p.id != "user-1"));
        assert!(room.participants.iter().all(|p| p.video_attached));
        assert!(room.media_warning.is_none());
        assert_eq!(room.total_clock, "10:00");
    }

    #[tokio::test]
    async fn test_create_room_requires_category() {
        let state = AppState::new();
        let host = alex(&state).await;

        let result = state.create_room(&host, &[]).await;
        assert!(matches!(result, Err(AppError::NoCategories)));

        let result = state.create_room(&host, &["sports".to_string()]).await;
        assert!(matches!(result, Err(AppError::NoCategories)));
    }

    #[tokio::test]
    async fn test_room_without_camera_continues() {
        let device = Arc::new(LoopbackCaptureDevice::unavailable());
        let state = state_with_device(device);
        let host = alex(&state).await;

        let room = state
            .create_room(&host, &["ethics".to_string()])
            .await
            .unwrap();
        assert!(room.media_warning.is_some());
        assert!(room.participants.iter().all(|p| !p.video_attached));

        assert!(state.start_debate(&room.id, "user-1").await.unwrap());
        assert!(matches!(
            state.toggle_mic(&room.id, "user-1").await,
            Err(AppError::NoCapture)
        ));
    }

    #[tokio::test]
    async fn test_tick_rooms_only_ticks_running_rooms() {
        let state = AppState::new();
        let host = alex(&state).await;
        let waiting = state
            .create_room(&host, &["politics".to_string()])
            .await
            .unwrap();
        let running = state
            .create_room(&host, &["politics".to_string()])
            .await
            .unwrap();
        state.start_debate(&running.id, "user-1").await.unwrap();

        assert_eq!(state.tick_rooms().await, 1);

        let running = state.get_room(&running.id).await.unwrap();
        assert_eq!(running.total_remaining, 599);
        assert_eq!(running.phase_remaining, 59);
        let waiting = state.get_room(&waiting.id).await.unwrap();
        assert_eq!(waiting.total_remaining, 600);
    }

    #[tokio::test]
    async fn test_join_before_start_only() {
        let state = AppState::new();
        let host = alex(&state).await;
        let sam = state.profiles.get("user-5").await.unwrap();
        let late = state.profiles.get("user-6").await.unwrap();

        let room = state
            .create_room(&host, &["health".to_string()])
            .await
            .unwrap();
        let joined = state.join_room(&room.id, &sam).await.unwrap();
        assert_eq!(joined.participants.last().unwrap().id, "user-5");
        assert_eq!(joined.participants.last().unwrap().kind, ParticipantKind::Human);

        state.start_debate(&room.id, "user-5").await.unwrap();
        assert!(matches!(
            state.join_room(&room.id, &late).await,
            Err(AppError::AlreadyStarted)
        ));
        // Rejoining as an existing participant is fine
        assert!(state.join_room(&room.id, &sam).await.is_ok());
    }

    #[tokio::test]
    async fn test_only_creator_controls_media() {
        let state = AppState::new();
        let host = alex(&state).await;
        let room = state
            .create_room(&host, &["social".to_string()])
            .await
            .unwrap();

        assert_eq!(state.toggle_mic(&room.id, "user-1").await.unwrap(), (false, true));
        assert_eq!(state.toggle_video(&room.id, "user-1").await.unwrap(), (false, false));
        assert!(matches!(
            state.toggle_mic(&room.id, "user-2").await,
            Err(AppError::NotMediaOwner)
        ));
    }

    #[tokio::test]
    async fn test_leave_mid_countdown_releases_capture_once() {
        let device = Arc::new(LoopbackCaptureDevice::new());
        let state = state_with_device(device.clone());
        let host = alex(&state).await;
        let room = state
            .create_room(&host, &["economics".to_string()])
            .await
            .unwrap();
        state.start_debate(&room.id, "user-1").await.unwrap();
        for _ in 0..30 {
            state.tick_rooms().await;
        }
        assert_eq!(device.live(), 1);

        assert!(state.leave_room(&room.id, "user-1").await.unwrap());
        assert!(state.get_room(&room.id).await.is_none());
        assert_eq!(device.acquired(), 1);
        assert_eq!(device.released(), 1);

        // A second leave finds nothing to release
        assert!(matches!(
            state.leave_room(&room.id, "user-1").await,
            Err(AppError::RoomNotFound(_))
        ));
        assert_eq!(device.released(), 1);
    }

    #[tokio::test]
    async fn test_creator_leaving_keeps_room_for_others() {
        let device = Arc::new(LoopbackCaptureDevice::new());
        let state = state_with_device(device.clone());
        let host = alex(&state).await;
        let guest = state.profiles.get("user-7").await.unwrap();
        let room = state
            .create_room(&host, &["education".to_string()])
            .await
            .unwrap();
        state.join_room(&room.id, &guest).await.unwrap();

        assert!(!state.leave_room(&room.id, "user-1").await.unwrap());
        assert_eq!(device.released(), 1);
        let view = state.get_room(&room.id).await.unwrap();
        assert!(view.participants.iter().all(|p| !p.video_attached));

        assert!(state.leave_room(&room.id, "user-7").await.unwrap());
        assert_eq!(device.released(), 1);
    }

    #[tokio::test]
    async fn test_unjoined_rooms_are_abandoned() {
        let device = Arc::new(LoopbackCaptureDevice::new());
        let state = state_with_device(device.clone());
        let host = alex(&state).await;

        let mut idle = Vec::new();
        for _ in 0..5 {
            let room = state
                .create_room(&host, &["technology".to_string()])
                .await
                .unwrap();
            idle.push(room.id);
        }
        let kept = state
            .create_room(&host, &["technology".to_string()])
            .await
            .unwrap();
        state.join_room(&kept.id, &host).await.unwrap();
        assert_eq!(device.live(), 6);

        for _ in 0..state.config.abandon_secs - 1 {
            state.tick_rooms().await;
        }
        assert_eq!(state.rooms.read().await.len(), 6);

        state.tick_rooms().await;
        for id in &idle {
            assert!(state.get_room(id).await.is_none());
        }
        assert!(state.get_room(&kept.id).await.is_some());
        assert_eq!(device.released(), 5);
        assert_eq!(device.live(), 1);
    }

    #[tokio::test]
    async fn test_rejoining_resets_idle_clock() {
        let state = AppState::new();
        let host = alex(&state).await;
        let room = state
            .create_room(&host, &["ethics".to_string()])
            .await
            .unwrap();

        for _ in 0..state.config.abandon_secs - 1 {
            state.tick_rooms().await;
        }
        state.join_room(&room.id, &host).await.unwrap();
        for _ in 0..state.config.abandon_secs * 2 {
            state.tick_rooms().await;
        }
        assert!(state.get_room(&room.id).await.is_some());
    }

    #[tokio::test]
    async fn test_second_connection_keeps_room_open() {
        let device = Arc::new(LoopbackCaptureDevice::new());
        let state = state_with_device(device.clone());
        let host = alex(&state).await;
        let room = state
            .create_room(&host, &["health".to_string()])
            .await
            .unwrap();

        // Two tabs for the same user
        state.join_room(&room.id, &host).await.unwrap();
        state.join_room(&room.id, &host).await.unwrap();

        assert!(!state.leave_room(&room.id, "user-1").await.unwrap());
        assert!(state.get_room(&room.id).await.is_some());
        assert_eq!(device.released(), 0);
        assert_eq!(state.toggle_mic(&room.id, "user-1").await.unwrap(), (false, true));

        assert!(state.leave_room(&room.id, "user-1").await.unwrap());
        assert!(state.get_room(&room.id).await.is_none());
        assert_eq!(device.released(), 1);
    }

    #[tokio::test]
    async fn test_notes_are_combined_in_turn_order() {
        let state = AppState::new();
        let host = alex(&state).await;
        let room = state
            .create_room(&host, &["environment".to_string()])
            .await
            .unwrap();

        state
            .update_notes(&room.id, "user-2", "Carbon taxes work".to_string())
            .await
            .unwrap();
        state
            .update_notes(&room.id, "user-1", "Cite the 2019 study".to_string())
            .await
            .unwrap();
        assert!(matches!(
            state.update_notes(&room.id, "stranger", "hi".to_string()).await,
            Err(AppError::NotParticipant)
        ));

        let rooms = state.rooms.read().await;
        let notes = rooms.get(&room.id).unwrap().combined_notes();
        assert_eq!(notes, "Alex Johnson: Cite the 2019 study\nSam Rivera: Carbon taxes work");
    }

    #[tokio::test]
    async fn test_acknowledge_before_results_is_ignored() {
        let state = AppState::new();
        let host = alex(&state).await;
        let room = state
            .create_room(&host, &["ethics".to_string()])
            .await
            .unwrap();

        assert!(!state.acknowledge_results(&room.id, "user-1").await.unwrap());
        assert!(state.get_room(&room.id).await.is_some());
    }
}
