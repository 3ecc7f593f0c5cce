use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::boleto::Boleto;
use crate::client::Client;
use crate::errors::{BillingError, Result};
use crate::schedule::GeneratedSchedule;
use crate::state::{Payment, PaymentGroup};
use crate::types::{ClientId, Document, PaymentGroupId, PaymentId};

/// durable storage for clients, groups, installments and boletos
///
/// implementations must make `insert_schedule` all-or-nothing, and
/// `settle_payment` and `replace_payment` compare-and-swap on the stored row.
pub trait BillingStore: Send + Sync {
    fn insert_client(&self, client: Client) -> Result<()>;
    fn get_client(&self, id: ClientId) -> Result<Option<Client>>;
    fn list_clients(&self) -> Result<Vec<Client>>;
    fn update_client(&self, client: Client) -> Result<()>;
    fn delete_client(&self, id: ClientId) -> Result<()>;

    /// persist a group and all of its installments atomically
    fn insert_schedule(&self, schedule: GeneratedSchedule) -> Result<()>;
    fn get_group(&self, id: PaymentGroupId) -> Result<Option<PaymentGroup>>;
    fn groups_for_client(&self, client_id: ClientId) -> Result<Vec<PaymentGroup>>;
    fn count_groups_for_payer(&self, document: &Document) -> Result<usize>;

    fn get_payment(&self, id: PaymentId) -> Result<Option<Payment>>;
    /// all installments, or only those of one client
    fn list_payments(&self, client_id: Option<ClientId>) -> Result<Vec<Payment>>;

    /// write a settled installment if the stored row is still `expected` and open
    ///
    /// fails with `SettlementConflict` when another writer got there first.
    fn settle_payment(&self, expected: &Payment, settled: Payment) -> Result<Payment>;

    /// overwrite an installment if the stored row is still `expected`
    fn replace_payment(&self, expected: &Payment, payment: Payment) -> Result<Payment>;

    /// store the first boleto of an installment; one boleto per installment
    fn insert_boleto(&self, boleto: Boleto) -> Result<Boleto>;
    /// swap a failed boleto for a new attempt; any other status conflicts
    fn replace_failed_boleto(&self, boleto: Boleto) -> Result<Boleto>;
    fn get_boleto(&self, payment_id: PaymentId) -> Result<Option<Boleto>>;
}

#[derive(Debug, Default)]
struct Tables {
    clients: HashMap<ClientId, Client>,
    groups: HashMap<PaymentGroupId, PaymentGroup>,
    payments: HashMap<PaymentId, Payment>,
    boletos: HashMap<PaymentId, Boleto>,
}

/// process-local store backed by hash maps behind a single lock
#[derive(Debug, Default)]
pub struct InMemoryStore {
    tables: RwLock<Tables>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Tables>> {
        self.tables.read().map_err(|_| BillingError::Storage {
            message: "store lock poisoned".to_string(),
        })
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Tables>> {
        self.tables.write().map_err(|_| BillingError::Storage {
            message: "store lock poisoned".to_string(),
        })
    }
}

impl BillingStore for InMemoryStore {
    fn insert_client(&self, client: Client) -> Result<()> {
        let mut tables = self.write()?;
        if tables.clients.values().any(|c| c.document == client.document) {
            return Err(BillingError::DuplicateDocument {
                document: client.document.to_string(),
            });
        }
        tables.clients.insert(client.id, client);
        Ok(())
    }

    fn get_client(&self, id: ClientId) -> Result<Option<Client>> {
        Ok(self.read()?.clients.get(&id).cloned())
    }

    fn list_clients(&self) -> Result<Vec<Client>> {
        let mut clients: Vec<Client> = self.read()?.clients.values().cloned().collect();
        clients.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
        Ok(clients)
    }

    fn update_client(&self, client: Client) -> Result<()> {
        let mut tables = self.write()?;
        if !tables.clients.contains_key(&client.id) {
            return Err(BillingError::ClientNotFound { id: client.id });
        }
        if tables
            .clients
            .values()
            .any(|c| c.id != client.id && c.document == client.document)
        {
            return Err(BillingError::DuplicateDocument {
                document: client.document.to_string(),
            });
        }
        tables.clients.insert(client.id, client);
        Ok(())
    }

    fn delete_client(&self, id: ClientId) -> Result<()> {
        let mut tables = self.write()?;
        let groups = tables.groups.values().filter(|g| g.client_id == id).count();
        if groups > 0 {
            return Err(BillingError::ClientHasPaymentGroups { id, groups });
        }
        tables
            .clients
            .remove(&id)
            .map(|_| ())
            .ok_or(BillingError::ClientNotFound { id })
    }

    fn insert_schedule(&self, schedule: GeneratedSchedule) -> Result<()> {
        let GeneratedSchedule { group, installments } = schedule;
        let mut tables = self.write()?;

        if !tables.clients.contains_key(&group.client_id) {
            return Err(BillingError::ClientNotFound { id: group.client_id });
        }
        if tables.groups.contains_key(&group.id)
            || installments.iter().any(|p| tables.payments.contains_key(&p.id))
        {
            return Err(BillingError::Storage {
                message: format!("payment group {} already stored", group.id),
            });
        }

        // validated above, so the writes below cannot fail halfway
        for payment in installments {
            tables.payments.insert(payment.id, payment);
        }
        tables.groups.insert(group.id, group);
        Ok(())
    }

    fn get_group(&self, id: PaymentGroupId) -> Result<Option<PaymentGroup>> {
        Ok(self.read()?.groups.get(&id).cloned())
    }

    fn groups_for_client(&self, client_id: ClientId) -> Result<Vec<PaymentGroup>> {
        let mut groups: Vec<PaymentGroup> = self
            .read()?
            .groups
            .values()
            .filter(|g| g.client_id == client_id)
            .cloned()
            .collect();
        groups.sort_by_key(|g| (g.creation_date, g.group_name.clone()));
        Ok(groups)
    }

    fn count_groups_for_payer(&self, document: &Document) -> Result<usize> {
        Ok(self
            .read()?
            .groups
            .values()
            .filter(|g| &g.payer_document == document)
            .count())
    }

    fn get_payment(&self, id: PaymentId) -> Result<Option<Payment>> {
        Ok(self.read()?.payments.get(&id).cloned())
    }

    fn list_payments(&self, client_id: Option<ClientId>) -> Result<Vec<Payment>> {
        let mut payments: Vec<Payment> = self
            .read()?
            .payments
            .values()
            .filter(|p| client_id.map_or(true, |id| p.client_id == id))
            .cloned()
            .collect();
        payments.sort_by_key(|p| (p.payment_group_id, p.installment_number));
        Ok(payments)
    }

    fn settle_payment(&self, expected: &Payment, settled: Payment) -> Result<Payment> {
        if expected.payment_status.is_terminal() {
            return Err(BillingError::SettlementConflict {
                id: expected.id,
                current: expected.payment_status,
            });
        }
        self.swap_payment(expected, settled)
    }

    fn replace_payment(&self, expected: &Payment, payment: Payment) -> Result<Payment> {
        self.swap_payment(expected, payment)
    }

    fn insert_boleto(&self, boleto: Boleto) -> Result<Boleto> {
        let mut tables = self.write()?;
        if !tables.payments.contains_key(&boleto.payment_id) {
            return Err(BillingError::PaymentNotFound { id: boleto.payment_id });
        }
        if let Some(existing) = tables.boletos.get(&boleto.payment_id) {
            return Err(BillingError::BoletoAlreadyExists {
                payment_id: boleto.payment_id,
                status: existing.status,
            });
        }
        tables.boletos.insert(boleto.payment_id, boleto.clone());
        Ok(boleto)
    }

    fn replace_failed_boleto(&self, boleto: Boleto) -> Result<Boleto> {
        let mut tables = self.write()?;
        match tables.boletos.get(&boleto.payment_id) {
            None => {
                return Err(BillingError::BoletoNotFound {
                    payment_id: boleto.payment_id,
                })
            }
            Some(existing) if !existing.status.is_retryable() => {
                return Err(BillingError::BoletoAlreadyExists {
                    payment_id: boleto.payment_id,
                    status: existing.status,
                })
            }
            Some(_) => {}
        }
        tables.boletos.insert(boleto.payment_id, boleto.clone());
        Ok(boleto)
    }

    fn get_boleto(&self, payment_id: PaymentId) -> Result<Option<Boleto>> {
        Ok(self.read()?.boletos.get(&payment_id).cloned())
    }
}

impl InMemoryStore {
    fn swap_payment(&self, expected: &Payment, next: Payment) -> Result<Payment> {
        let mut tables = self.write()?;
        let current = tables
            .payments
            .get_mut(&expected.id)
            .ok_or(BillingError::PaymentNotFound { id: expected.id })?;

        if current != expected {
            return Err(BillingError::SettlementConflict {
                id: expected.id,
                current: current.payment_status,
            });
        }
        *current = next.clone();
        Ok(next)
    }
}
