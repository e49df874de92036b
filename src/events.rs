// 11.0: every state change produces an event. used for audit trails and for
// notifying whoever watches the keeper. the EventPayload enum lists all event types.

use crate::conditional::TriggerReason;
use crate::types::{AccountId, Amount, PositionId, StopPrice, Timestamp, UpkeepId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EventId(pub u64);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    pub timestamp: Timestamp,
    pub payload: EventPayload,
}

impl Event {
    pub fn new(id: EventId, timestamp: Timestamp, payload: EventPayload) -> Self {
        Self {
            id,
            timestamp,
            payload,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum EventPayload {
    // Order book events
    OrderSet(OrderSetEvent),
    OrderDeleted(OrderDeletedEvent),
    OrderExecuted(OrderExecutedEvent),
    ExecutionWindowUpdated(ExecutionWindowUpdatedEvent),

    // Funding watchdog events
    RegistrationAdded(RegistrationEvent),
    RegistrationRemoved(RegistrationEvent),
    RegistrationFunded(RegistrationFundedEvent),
    PoolWithdrawal(PoolWithdrawalEvent),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderSetEvent {
    pub position_id: PositionId,
    pub caller: AccountId,
    pub upper_stop_price: StopPrice,
    pub lower_stop_price: StopPrice,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderDeletedEvent {
    pub position_id: PositionId,
    pub caller: AccountId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderExecutedEvent {
    pub position_id: PositionId,
    pub executor: AccountId,
    pub reason: TriggerReason,
    pub paid: Amount,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionWindowUpdatedEvent {
    pub old_secs: u64,
    pub new_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistrationEvent {
    pub upkeep_id: UpkeepId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistrationFundedEvent {
    pub upkeep_id: UpkeepId,
    pub amount: Amount,
    pub new_balance: Amount,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolWithdrawalEvent {
    pub to: AccountId,
    pub amount: Amount,
}

// 11.1: bounded in-memory log. oldest events are dropped past max_events.
#[derive(Debug, Clone)]
pub struct EventLog {
    events: Vec<Event>,
    next_id: u64,
    max_events: usize,
}

impl EventLog {
    pub fn new(max_events: usize) -> Self {
        Self {
            events: Vec::new(),
            next_id: 1,
            max_events,
        }
    }

    pub fn emit(&mut self, timestamp: Timestamp, payload: EventPayload) -> EventId {
        let id = EventId(self.next_id);
        self.next_id += 1;
        tracing::trace!(event_id = id.0, ?payload, "event");
        self.events.push(Event::new(id, timestamp, payload));

        if self.events.len() > self.max_events {
            let drain_count = self.events.len() - self.max_events;
            self.events.drain(0..drain_count);
        }
        id
    }

    pub fn recent(&self, count: usize) -> &[Event] {
        let start = self.events.len().saturating_sub(count);
        &self.events[start..]
    }

    pub fn all(&self) -> &[Event] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn deleted(id: u64) -> EventPayload {
        EventPayload::OrderDeleted(OrderDeletedEvent {
            position_id: PositionId(id),
            caller: AccountId(1),
        })
    }

    #[test]
    fn log_is_bounded() {
        let mut log = EventLog::new(3);
        for i in 0..5 {
            log.emit(Timestamp::from_secs(i), deleted(i as u64));
        }
        assert_eq!(log.len(), 3);
        assert_eq!(log.all()[0].id, EventId(3));
        assert_eq!(log.recent(1)[0].id, EventId(5));
        assert_eq!(log.recent(10).len(), 3);
    }

    #[test]
    fn event_serialization() {
        let event = Event::new(EventId(1), Timestamp::from_secs(10), deleted(4));
        let json = serde_json::to_string(&event).unwrap();
        let back: Event = serde_json::from_str(&json).unwrap();
        assert_eq!(back.id, EventId(1));
        assert!(matches!(back.payload, EventPayload::OrderDeleted(e) if e.position_id == PositionId(4)));
    }
}
