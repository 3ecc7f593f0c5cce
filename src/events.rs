use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::boleto::{BankType, BoletoId, BoletoStatus};
use crate::decimal::Money;
use crate::types::{ClientId, PaymentGroupId, PaymentId, PaymentStatus};

/// all events that can be emitted by the billing service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum BillingEvent {
    // client events
    ClientRegistered {
        client_id: ClientId,
        timestamp: DateTime<Utc>,
    },
    ClientUpdated {
        client_id: ClientId,
        timestamp: DateTime<Utc>,
    },
    ClientRemoved {
        client_id: ClientId,
        timestamp: DateTime<Utc>,
    },

    // schedule events
    PaymentGroupCreated {
        group_id: PaymentGroupId,
        client_id: ClientId,
        installments: u32,
        total_value: Money,
        first_due_date: NaiveDate,
        timestamp: DateTime<Utc>,
    },

    // installment events
    InstallmentSettled {
        payment_id: PaymentId,
        group_id: PaymentGroupId,
        status: PaymentStatus,
        payment_date: NaiveDate,
        amount_paid: Money,
        timestamp: DateTime<Utc>,
    },
    InstallmentCorrected {
        payment_id: PaymentId,
        old_status: PaymentStatus,
        new_status: PaymentStatus,
        timestamp: DateTime<Utc>,
    },

    // boleto events
    BoletoIssued {
        boleto_id: BoletoId,
        payment_id: PaymentId,
        bank: BankType,
        status: BoletoStatus,
        retry: bool,
        timestamp: DateTime<Utc>,
    },
}

/// event store for collecting events during operations
#[derive(Debug, Default)]
pub struct EventStore {
    events: Vec<BillingEvent>,
}

impl EventStore {
    pub fn new() -> Self {
        Self { events: Vec::new() }
    }

    pub fn emit(&mut self, event: BillingEvent) {
        self.events.push(event);
    }

    pub fn take_events(&mut self) -> Vec<BillingEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn events(&self) -> &[BillingEvent] {
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
    use uuid::Uuid;

    #[test]
    fn test_take_drains() {
        let mut store = EventStore::new();
        store.emit(BillingEvent::ClientRegistered {
            client_id: Uuid::new_v4(),
            timestamp: Utc::now(),
        });

        assert_eq!(store.len(), 1);
        assert_eq!(store.take_events().len(), 1);
        assert!(store.is_empty());
    }
}
