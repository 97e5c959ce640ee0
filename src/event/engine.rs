//! Event Engine
//!
//! Decides which events fire for a trigger, runs them, and commits their
//! flag changes.
//!
//! An event is eligible when it has not fired yet (for `once` events) and
//! every prerequisite holds. Flags from `set_flags` / `clear_flags` are only
//! applied after the whole script succeeds, so commands inside the script
//! see the flags as they were before the event. If the script fails, its
//! flags are not applied and the event stays eligible; side effects the
//! script already caused are not undone.

use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::{debug, info, warn};

use super::context::GameContext;
use super::definition::{EventDef, TriggerPayload};
use super::registry::EventRegistry;
use super::script;
use crate::error::EngineError;
use crate::flags::FlagStore;
use crate::save::SessionSnapshot;

/// Nested CALL_EVENT depth allowed before giving up
pub const DEFAULT_MAX_CALL_DEPTH: usize = 16;

/// Dispatches triggers to eligible events
pub struct EventEngine {
    registry: Arc<EventRegistry>,
    /// Ids of `once` events that already ran
    fired: BTreeSet<String>,
    max_call_depth: usize,
    /// Events currently executing (outermost included)
    depth: usize,
}

impl EventEngine {
    pub fn new(registry: Arc<EventRegistry>) -> Self {
        Self {
            registry,
            fired: BTreeSet::new(),
            max_call_depth: DEFAULT_MAX_CALL_DEPTH,
            depth: 0,
        }
    }

    pub fn with_max_call_depth(mut self, max_call_depth: usize) -> Self {
        self.max_call_depth = max_call_depth.max(1);
        self
    }

    pub fn registry(&self) -> &Arc<EventRegistry> {
        &self.registry
    }

    pub fn has_fired(&self, event_id: &str) -> bool {
        self.fired.contains(event_id)
    }

    /// Not already fired (if `once`) and all prerequisites hold
    pub fn is_eligible(&self, event: &EventDef, flags: &FlagStore) -> bool {
        if event.once && self.fired.contains(&event.id) {
            return false;
        }
        event.prerequisites.iter().all(|p| p.holds(|f| flags.get(f)))
    }

    /// Run every eligible event listening for this trigger, in catalog order.
    ///
    /// Eligibility is checked right before each candidate runs, so an earlier
    /// candidate can disable a later one. Returns the ids that fired.
    pub fn handle_trigger(
        &mut self,
        ctx: &mut GameContext,
        trigger_type: &str,
        payload: &TriggerPayload,
    ) -> Result<Vec<String>, EngineError> {
        let registry = Arc::clone(&self.registry);
        let candidates = registry.candidates(trigger_type);
        debug!("Trigger {} has {} candidates", trigger_type, candidates.len());

        let mut fired = Vec::new();
        for event in candidates {
            if !event.listens_for(trigger_type, payload) {
                continue;
            }
            if !self.is_eligible(&event, &ctx.flags) {
                debug!("Event {} not eligible", event.id);
                continue;
            }
            self.run_event(ctx, &event)?;
            fired.push(event.id.clone());
        }

        Ok(fired)
    }

    /// Run one event by id, skipping trigger matching but not eligibility.
    ///
    /// Unknown or ineligible events are a no-op and return `false`.
    pub fn invoke(&mut self, ctx: &mut GameContext, event_id: &str) -> Result<bool, EngineError> {
        let Some(event) = self.registry.lookup_by_id(event_id) else {
            warn!("Cannot invoke unknown event '{}'", event_id);
            return Ok(false);
        };

        if !self.is_eligible(&event, &ctx.flags) {
            debug!("Invoked event {} not eligible", event_id);
            return Ok(false);
        }

        self.run_event(ctx, &event)?;
        Ok(true)
    }

    fn run_event(&mut self, ctx: &mut GameContext, event: &EventDef) -> Result<(), EngineError> {
        if self.depth >= self.max_call_depth {
            return Err(EngineError::CycleDetected {
                event_id: event.id.clone(),
                depth: self.max_call_depth,
            });
        }

        info!("Firing event {} ({})", event.id, event.category.as_str());

        self.depth += 1;
        let result = script::execute_script(self, ctx, &event.script);
        self.depth -= 1;

        if let Err(e) = result {
            warn!("Event {} interrupted, flags not applied: {}", event.id, e);
            return Err(e);
        }

        for flag in &event.set_flags {
            ctx.flags.set(flag, true);
        }
        for flag in &event.clear_flags {
            ctx.flags.set(flag, false);
        }
        if event.once {
            self.fired.insert(event.id.clone());
        }

        Ok(())
    }

    /// Capture flags and fired-set for saving
    pub fn snapshot(&self, flags: &FlagStore) -> SessionSnapshot {
        SessionSnapshot::new(flags.clone(), self.fired.clone())
    }

    /// Replace session state with a saved snapshot
    pub fn restore(&mut self, ctx: &mut GameContext, snapshot: SessionSnapshot) {
        for id in &snapshot.fired {
            if self.registry.lookup_by_id(id).is_none() {
                warn!("Save references unknown event '{}'", id);
            }
        }
        info!(
            "Restored {} flags and {} fired events from {}",
            snapshot.flags.len(),
            snapshot.fired.len(),
            snapshot.saved_at
        );
        ctx.flags = snapshot.flags;
        self.fired = snapshot.fired;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialogue::{DialogueEntry, DialogueResolver};
    use crate::error::CollaboratorError;
    use crate::event::context::{BattleManager, BattleOutcome, DialogueUi, MemoryInventory};
    use crate::event::definition::RawEventDef;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use serde_json::{Value, json};
    use std::cell::RefCell;
    use std::rc::Rc;

    type Shown = Rc<RefCell<Vec<(String, String)>>>;

    struct RecordingUi {
        shown: Shown,
        choice: usize,
    }

    impl DialogueUi for RecordingUi {
        fn show_dialogue(&mut self, speaker: &str, text: &str) -> Result<(), CollaboratorError> {
            self.shown.borrow_mut().push((speaker.to_string(), text.to_string()));
            Ok(())
        }

        fn choose(&mut self, _options: &[String]) -> Result<usize, CollaboratorError> {
            Ok(self.choice)
        }
    }

    struct RecordingBattles(Rc<RefCell<Vec<String>>>);

    impl BattleManager for RecordingBattles {
        fn start(&mut self, battle_id: &str, _context: Option<&str>) -> Result<BattleOutcome, CollaboratorError> {
            self.0.borrow_mut().push(battle_id.to_string());
            Ok(BattleOutcome::Won)
        }
    }

    struct Harness {
        engine: EventEngine,
        ctx: GameContext,
        shown: Shown,
        battles: Rc<RefCell<Vec<String>>>,
    }

    impl Harness {
        fn new(events: Vec<Value>) -> Self {
            Self::with_choice(events, 0)
        }

        fn with_choice(events: Vec<Value>, choice: usize) -> Self {
            let mut registry = EventRegistry::new();
            for value in events {
                let raw: RawEventDef = serde_json::from_value(value).unwrap();
                registry.register(EventDef::from_raw(&raw).unwrap()).unwrap();
            }

            let mut dialogue = DialogueResolver::new("expanded", StdRng::seed_from_u64(42));
            dialogue.insert(DialogueEntry::from_json("intro.1", &json!({"base": "Hi.", "expanded": "Hello!"})).unwrap());
            dialogue.insert_character("mom", "Mom");

            let shown = Shown::default();
            let battles = Rc::new(RefCell::new(Vec::new()));
            let ctx = GameContext::new(
                dialogue,
                Box::new(MemoryInventory::new()),
                Box::new(RecordingUi { shown: Rc::clone(&shown), choice }),
                Box::new(RecordingBattles(Rc::clone(&battles))),
            );

            Self {
                engine: EventEngine::new(Arc::new(registry)),
                ctx,
                shown,
                battles,
            }
        }

        fn fire(&mut self, trigger_type: &str) -> Vec<String> {
            self.engine
                .handle_trigger(&mut self.ctx, trigger_type, &TriggerPayload::default())
                .unwrap()
        }

        fn fire_at(&mut self, trigger_type: &str, location: &str) -> Vec<String> {
            self.engine
                .handle_trigger(&mut self.ctx, trigger_type, &TriggerPayload::at_location(location))
                .unwrap()
        }
    }

    fn story_events() -> Vec<Value> {
        vec![
            json!({
                "id": "story.start",
                "category": "main",
                "triggers": [{"type": "game_start"}],
                "set_flags": ["story.start"],
                "script": [{"cmd": "SHOW_TEXT", "speaker": "mom", "text_id": "intro.1"}]
            }),
            json!({
                "id": "story.rival_initial_visit",
                "category": "rival",
                "prerequisites": ["story.start", "!story.rival_initial_visit"],
                "triggers": [{"type": "enter_location", "location": "PLAYER_HOUSE_1F"}],
                "set_flags": ["story.rival_initial_visit"],
                "script": [{"cmd": "SHOW_TEXT", "speaker": "barry", "text_id": "rival.visit"}]
            }),
        ]
    }

    #[test]
    fn test_opening_sequence_fires_once_each() {
        let mut h = Harness::new(story_events());

        // Rival visit needs story.start first
        assert!(h.fire_at("enter_location", "PLAYER_HOUSE_1F").is_empty());

        assert_eq!(h.fire("game_start"), vec!["story.start"]);
        assert_eq!(h.fire_at("enter_location", "PLAYER_HOUSE_1F"), vec!["story.rival_initial_visit"]);
        assert!(h.fire_at("enter_location", "PLAYER_HOUSE_1F").is_empty());
        assert!(h.fire("game_start").is_empty());

        let shown = h.shown.borrow();
        assert_eq!(shown.len(), 2);
        assert_eq!(shown[0], ("Mom".to_string(), "Hello!".to_string()));
        // Unknown speaker and text fall back instead of failing
        assert_eq!(shown[1], ("barry".to_string(), "[missing:rival.visit]".to_string()));
    }

    #[test]
    fn test_once_event_ignores_flag_changes_after_firing() {
        let mut h = Harness::new(story_events());
        h.fire("game_start");
        h.ctx.flags.set("story.start", false);
        h.ctx.flags.set("story.start", true);
        assert!(h.fire("game_start").is_empty());
        assert!(h.engine.has_fired("story.start"));
    }

    #[test]
    fn test_repeatable_event_fires_every_time() {
        let mut h = Harness::new(vec![json!({
            "id": "nurse.heal",
            "category": "system",
            "once": false,
            "triggers": [{"type": "talk", "npc_id": "nurse"}],
            "script": [{"cmd": "GIVE_ITEM", "item": "oran_berry"}]
        })]);

        for _ in 0..3 {
            assert_eq!(h.fire("talk"), vec!["nurse.heal"]);
        }
        assert!(!h.engine.has_fired("nurse.heal"));
        assert!(h.ctx.inventory.has("oran_berry", 3));
    }

    #[test]
    fn test_prerequisites_are_a_conjunction() {
        let mut h = Harness::new(vec![json!({
            "id": "gated",
            "category": "optional",
            "once": false,
            "prerequisites": ["a", "!b"],
            "triggers": [{"type": "tick"}],
            "script": [{"cmd": "SET_FLAG", "flag": "ran"}]
        })]);
        let event = h.engine.registry().lookup_by_id("gated").unwrap();

        let cases = [(false, false, false), (true, false, true), (true, true, false), (false, true, false)];
        for (a, b, expected) in cases {
            h.ctx.flags.set("a", a);
            h.ctx.flags.set("b", b);
            h.ctx.flags.set("unrelated", !a);
            assert_eq!(h.engine.is_eligible(&event, &h.ctx.flags), expected, "a={} b={}", a, b);
        }
    }

    #[test]
    fn test_dispatch_order_matches_catalog_order() {
        let events: Vec<Value> = ["c.third", "a.first", "b.second"]
            .iter()
            .map(|id| {
                json!({
                    "id": id,
                    "category": "main",
                    "triggers": [{"type": "game_start"}],
                    "set_flags": [id],
                    "script": []
                })
            })
            .collect();

        let first_run = Harness::new(events.clone()).fire("game_start");
        let second_run = Harness::new(events).fire("game_start");
        assert_eq!(first_run, vec!["c.third", "a.first", "b.second"]);
        assert_eq!(first_run, second_run);
    }

    #[test]
    fn test_earlier_candidate_can_disable_later_one() {
        let mut h = Harness::new(vec![
            json!({
                "id": "door.locked",
                "category": "optional",
                "triggers": [{"type": "use_door"}],
                "set_flags": ["door.opened"],
                "script": [{"cmd": "SET_FLAG", "flag": "door.tried"}]
            }),
            json!({
                "id": "door.still_locked",
                "category": "optional",
                "prerequisites": ["!door.opened"],
                "triggers": [{"type": "use_door"}],
                "set_flags": ["door.complained"],
                "script": []
            }),
        ]);

        assert_eq!(h.fire("use_door"), vec!["door.locked"]);
        assert!(!h.ctx.flags.get("door.complained"));
    }

    #[test]
    fn test_script_sees_flags_before_commit() {
        let mut h = Harness::new(vec![
            json!({
                "id": "parent",
                "category": "main",
                "triggers": [{"type": "go"}],
                "set_flags": ["parent.done"],
                "script": [{"cmd": "CALL_EVENT", "event_id": "needs_parent"}]
            }),
            json!({
                "id": "needs_parent",
                "category": "main",
                "prerequisites": ["parent.done"],
                "triggers": [{"type": "script_call"}],
                "set_flags": ["child.done"],
                "script": []
            }),
        ]);

        h.fire("go");
        assert!(h.ctx.flags.get("parent.done"));
        assert!(!h.ctx.flags.get("child.done"));
    }

    #[test]
    fn test_script_sees_cleared_flag_until_commit() {
        let mut h = Harness::new(vec![
            json!({
                "id": "gate.close",
                "category": "system",
                "triggers": [{"type": "go"}],
                "clear_flags": ["gate.open"],
                "script": [{"cmd": "CALL_EVENT", "event_id": "gate.pass"}]
            }),
            json!({
                "id": "gate.pass",
                "category": "system",
                "prerequisites": ["gate.open"],
                "triggers": [{"type": "script_call"}],
                "set_flags": ["gate.passed"],
                "script": []
            }),
        ]);
        h.ctx.flags.set("gate.open", true);

        assert_eq!(h.fire("go"), vec!["gate.close"]);

        // The child ran, so gate.open was still raised inside the script
        assert!(h.engine.has_fired("gate.pass"));
        assert!(h.ctx.flags.get("gate.passed"));
        assert!(!h.ctx.flags.get("gate.open"));
    }

    #[test]
    fn test_clear_flag_command_applies_mid_script() {
        let mut h = Harness::new(vec![
            json!({
                "id": "door.unlock",
                "category": "optional",
                "triggers": [{"type": "use_key"}],
                "script": [
                    {"cmd": "CLEAR_FLAG", "flag": "door.locked"},
                    {"cmd": "CALL_EVENT", "event_id": "door.peek"}
                ]
            }),
            json!({
                "id": "door.peek",
                "category": "optional",
                "prerequisites": ["!door.locked"],
                "triggers": [{"type": "script_call"}],
                "set_flags": ["door.peeked"],
                "script": []
            }),
        ]);
        h.ctx.flags.set("door.locked", true);

        assert_eq!(h.fire("use_key"), vec!["door.unlock"]);
        assert!(!h.ctx.flags.get("door.locked"));
        assert!(h.ctx.flags.get("door.peeked"));
        assert!(h.engine.has_fired("door.peek"));
    }

    #[test]
    fn test_call_event_runs_child_then_noop_once_fired() {
        let mut h = Harness::with_choice(
            vec![
                json!({
                    "id": "lab.approach",
                    "category": "main",
                    "once": false,
                    "triggers": [{"type": "enter_location", "location": "LAB"}],
                    "script": [
                        {"cmd": "SHOW_TEXT", "speaker": "mom", "text_id": "intro.1"},
                        {"cmd": "CALL_EVENT", "event_id": "lab.choice"}
                    ]
                }),
                json!({
                    "id": "lab.choice",
                    "category": "main",
                    "triggers": [{"type": "script_call"}],
                    "set_flags": ["starter_chosen"],
                    "script": [
                        {"cmd": "STARTER_CHOICE", "choices": ["turtwig", "chimchar", "piplup"]},
                        {"cmd": "START_BATTLE", "battle_id": "rival_1", "context": "tutorial"}
                    ]
                }),
            ],
            2,
        );

        assert_eq!(h.fire_at("enter_location", "LAB"), vec!["lab.approach"]);
        assert!(h.engine.has_fired("lab.choice"));
        assert!(h.ctx.flags.get("starter_chosen"));
        assert!(h.ctx.flags.get("starter.piplup"));
        assert_eq!(h.ctx.flags.value("player.starter"), Some("piplup"));
        assert_eq!(*h.battles.borrow(), vec!["rival_1".to_string()]);

        // Second visit: the child is already fired, so the call is a no-op
        assert_eq!(h.fire_at("enter_location", "LAB"), vec!["lab.approach"]);
        assert_eq!(h.battles.borrow().len(), 1);
        assert_eq!(h.shown.borrow().len(), 2);

        assert!(!h.engine.invoke(&mut h.ctx, "lab.choice").unwrap());
        assert!(!h.engine.invoke(&mut h.ctx, "no.such.event").unwrap());
    }

    #[test]
    fn test_location_payload_filters_candidates() {
        let mut h = Harness::new(story_events());
        h.fire("game_start");
        assert!(h.fire_at("enter_location", "ROUTE_201").is_empty());
        assert_eq!(h.fire_at("enter_location", "PLAYER_HOUSE_1F").len(), 1);
    }

    #[test]
    fn test_failed_script_keeps_event_eligible() {
        let mut h = Harness::new(vec![json!({
            "id": "shop.refund",
            "category": "optional",
            "triggers": [{"type": "talk"}],
            "set_flags": ["shop.refunded"],
            "script": [
                {"cmd": "SET_FLAG", "flag": "shop.visited"},
                {"cmd": "GIVE_ITEM", "item": "potion", "qty": -2}
            ]
        })]);

        let err = h
            .engine
            .handle_trigger(&mut h.ctx, "talk", &TriggerPayload::default())
            .unwrap_err();
        assert!(matches!(err, EngineError::Collaborator(CollaboratorError::InventoryUnderflow { .. })));

        // Side effects before the failure stay, the event's own flags do not
        assert!(h.ctx.flags.get("shop.visited"));
        assert!(!h.ctx.flags.get("shop.refunded"));
        assert!(!h.engine.has_fired("shop.refund"));

        h.ctx.inventory.add("potion", 2).unwrap();
        assert_eq!(h.fire("talk"), vec!["shop.refund"]);
        assert!(h.ctx.flags.get("shop.refunded"));
    }

    #[test]
    fn test_self_calling_event_hits_depth_limit() {
        let mut h = Harness::new(vec![
            json!({
                "id": "loop.a",
                "category": "system",
                "once": false,
                "triggers": [{"type": "go"}],
                "set_flags": ["loop.done"],
                "script": [{"cmd": "CALL_EVENT", "event_id": "loop.a"}]
            }),
            json!({
                "id": "plain",
                "category": "system",
                "triggers": [{"type": "other"}],
                "script": [{"cmd": "CALL_EVENT", "event_id": "leaf"}]
            }),
            json!({
                "id": "leaf",
                "category": "system",
                "triggers": [{"type": "script_call"}],
                "set_flags": ["leaf.done"],
                "script": []
            }),
        ]);
        h.engine = EventEngine::new(Arc::clone(h.engine.registry())).with_max_call_depth(4);

        let err = h
            .engine
            .handle_trigger(&mut h.ctx, "go", &TriggerPayload::default())
            .unwrap_err();
        match err {
            EngineError::CycleDetected { event_id, depth } => {
                assert_eq!(event_id, "loop.a");
                assert_eq!(depth, 4);
            }
            other => panic!("unexpected error {}", other),
        }
        assert!(!h.ctx.flags.get("loop.done"));

        // Depth is unwound after the failure, so shallow chains still run
        assert_eq!(h.fire("other"), vec!["plain"]);
        assert!(h.ctx.flags.get("leaf.done"));
    }

    #[test]
    fn test_unknown_command_is_skipped() {
        let mut h = Harness::new(vec![json!({
            "id": "future",
            "category": "optional",
            "triggers": [{"type": "go"}],
            "script": [
                {"cmd": "PLAY_CUTSCENE", "name": "lake"},
                {"cmd": "SET_FLAG", "flag": "after.cutscene"}
            ]
        })]);

        assert_eq!(h.fire("go"), vec!["future"]);
        assert!(h.ctx.flags.get("after.cutscene"));
    }

    #[test]
    fn test_snapshot_restore_round_trip() {
        let mut h = Harness::new(story_events());
        h.fire("game_start");
        let snapshot = h.engine.snapshot(&h.ctx.flags);

        let mut fresh = Harness::new(story_events());
        fresh.engine.restore(&mut fresh.ctx, snapshot);
        assert!(fresh.engine.has_fired("story.start"));
        assert!(fresh.fire("game_start").is_empty());
        assert_eq!(fresh.fire_at("enter_location", "PLAYER_HOUSE_1F"), vec!["story.rival_initial_visit"]);
    }
}
