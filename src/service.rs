use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, NaiveDate, Utc};
use hourglass_rs::SafeTimeProvider;
use tracing::{debug, info, instrument, warn};

use crate::boleto::{BankStrategies, BankType, Boleto, BoletoRequest};
use crate::client::{Client, ClientUpdate, NewClient};
use crate::config::EngineConfig;
use crate::errors::{BillingError, Result};
use crate::events::{BillingEvent, EventStore};
use crate::grouping::{GroupingService, PaymentFilter};
use crate::schedule::{NewPaymentGroup, ScheduleGenerator};
use crate::session::SessionContext;
use crate::state::{Payment, PaymentGroup};
use crate::status::{PaymentCorrection, PaymentStatusResolver, Settlement};
use crate::store::BillingStore;
use crate::types::{ClientId, Document, PaymentGroupId, PaymentId};
use crate::views::{BoletoView, ClientView, GroupedPaymentView, PaymentGroupView, PaymentView};

/// request-facing billing operations
///
/// every operation authorizes the caller's session against the clock first and
/// reads "today" from the business calendar. state lives in the store; held here
/// are the bank integrations and the queue of emitted events.
pub struct BillingService<S: BillingStore> {
    store: S,
    config: EngineConfig,
    banks: BankStrategies,
    events: Mutex<EventStore>,
}

impl<S: BillingStore> BillingService<S> {
    pub fn new(store: S, config: EngineConfig) -> Self {
        let banks = if config.mock_bank_enabled {
            BankStrategies::with_mock()
        } else {
            BankStrategies::new()
        };
        Self {
            store,
            config,
            banks,
            events: Mutex::new(EventStore::new()),
        }
    }

    /// replace the bank integrations used for boletos
    pub fn with_bank_strategies(mut self, banks: BankStrategies) -> Self {
        self.banks = banks;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// drain events emitted since the last call
    pub fn take_events(&self) -> Result<Vec<BillingEvent>> {
        Ok(self.lock_events()?.take_events())
    }

    // clients

    #[instrument(skip(self, session, time))]
    pub fn list_clients(
        &self,
        session: &SessionContext,
        time: &SafeTimeProvider,
    ) -> Result<Vec<ClientView>> {
        self.authorize(session, time)?;
        let clients = self.store.list_clients()?;
        debug!(count = clients.len(), "listed clients");
        Ok(clients.iter().map(ClientView::from).collect())
    }

    #[instrument(skip(self, session, time), fields(client_id = %id))]
    pub fn get_client(
        &self,
        session: &SessionContext,
        id: ClientId,
        time: &SafeTimeProvider,
    ) -> Result<ClientView> {
        self.authorize(session, time)?;
        Ok(ClientView::from(&self.load_client(id)?))
    }

    #[instrument(skip(self, session, request, time))]
    pub fn create_client(
        &self,
        session: &SessionContext,
        request: NewClient,
        time: &SafeTimeProvider,
    ) -> Result<ClientView> {
        let now = self.authorize(session, time)?;
        let client = Client::register(request, &self.config)?;

        if let Err(err) = self.store.insert_client(client.clone()) {
            warn!(error = %err, "client registration rejected");
            return Err(err);
        }
        info!(client_id = %client.id, document = %client.document, "client registered");

        self.emit(BillingEvent::ClientRegistered {
            client_id: client.id,
            timestamp: now,
        })?;
        Ok(ClientView::from(&client))
    }

    #[instrument(skip(self, session, update, time), fields(client_id = %id))]
    pub fn update_client(
        &self,
        session: &SessionContext,
        id: ClientId,
        update: ClientUpdate,
        time: &SafeTimeProvider,
    ) -> Result<ClientView> {
        let now = self.authorize(session, time)?;
        let updated = self.load_client(id)?.apply_update(update, &self.config)?;

        self.store.update_client(updated.clone())?;
        info!("client updated");

        self.emit(BillingEvent::ClientUpdated {
            client_id: id,
            timestamp: now,
        })?;
        Ok(ClientView::from(&updated))
    }

    #[instrument(skip(self, session, time), fields(client_id = %id))]
    pub fn delete_client(
        &self,
        session: &SessionContext,
        id: ClientId,
        time: &SafeTimeProvider,
    ) -> Result<()> {
        let now = self.authorize(session, time)?;

        if let Err(err) = self.store.delete_client(id) {
            warn!(error = %err, "client removal rejected");
            return Err(err);
        }
        info!("client removed");

        self.emit(BillingEvent::ClientRemoved {
            client_id: id,
            timestamp: now,
        })
    }

    // payment groups

    /// create a payment group and its full installment schedule
    #[instrument(
        skip(self, session, request, time),
        fields(client_id = %request.client_id, installments = request.total_installments)
    )]
    pub fn create_payment_group(
        &self,
        session: &SessionContext,
        request: NewPaymentGroup,
        time: &SafeTimeProvider,
    ) -> Result<PaymentGroupView> {
        let now = self.authorize(session, time)?;
        let today = self.today(now);

        let client = self.load_client(request.client_id)?;
        let payer_document = Document::parse(&request.payer_document)?;
        let existing = self.store.count_groups_for_payer(&payer_document)?;

        let schedule =
            ScheduleGenerator::new(&self.config).generate(&request, &client, existing, today)?;
        let total_value = schedule.total_value();
        let view = PaymentGroupView::new(&schedule.group, &schedule.installments);
        let group_id = schedule.group.id;

        self.store.insert_schedule(schedule)?;
        info!(
            group_id = %group_id,
            group_name = %view.group_name,
            total_value = %total_value,
            "payment group created"
        );

        self.emit(BillingEvent::PaymentGroupCreated {
            group_id,
            client_id: client.id,
            installments: view.total_installments,
            total_value,
            first_due_date: view.first_installment_due_date,
            timestamp: now,
        })?;
        Ok(view)
    }

    // payments

    /// grouped installments for one month, with status and overdue value as of today
    #[instrument(skip(self, session, time))]
    pub fn list_payments(
        &self,
        session: &SessionContext,
        filter: &PaymentFilter,
        time: &SafeTimeProvider,
    ) -> Result<Vec<GroupedPaymentView>> {
        let now = self.authorize(session, time)?;
        let today = self.today(now);

        let stored = self.store.list_payments(filter.client_id)?;
        let groups = self.load_groups(&stored)?;

        let resolved = stored
            .iter()
            .map(|payment| {
                let group = group_of(&groups, payment.payment_group_id)?;
                PaymentStatusResolver::new(group.overdue_terms()).resolve(payment, today)
            })
            .collect::<Result<Vec<Payment>>>()?;

        let groupings = GroupingService::new().group(&resolved, filter, today)?;
        debug!(
            rows = resolved.len(),
            groups = groupings.len(),
            today = %today,
            "grouped payments"
        );

        groupings
            .iter()
            .map(|grouping| {
                let group = group_of(&groups, grouping.payment_group_id())?;
                Ok(GroupedPaymentView::new(grouping, group))
            })
            .collect()
    }

    /// every installment as of today, ungrouped
    #[instrument(skip(self, session, time))]
    pub fn list_all_payments(
        &self,
        session: &SessionContext,
        time: &SafeTimeProvider,
    ) -> Result<Vec<PaymentView>> {
        let now = self.authorize(session, time)?;
        let today = self.today(now);

        let stored = self.store.list_payments(None)?;
        let groups = self.load_groups(&stored)?;
        debug!(rows = stored.len(), today = %today, "listed all payments");

        stored
            .iter()
            .map(|payment| {
                let group = group_of(&groups, payment.payment_group_id)?;
                let resolved =
                    PaymentStatusResolver::new(group.overdue_terms()).resolve(payment, today)?;
                Ok(PaymentView::new(&resolved, group))
            })
            .collect()
    }

    /// settle an installment as paid today
    ///
    /// already settled installments are returned unchanged. losing a concurrent
    /// settlement to another writer fails with `SettlementConflict`.
    #[instrument(skip(self, session, time), fields(payment_id = %id))]
    pub fn mark_as_paid(
        &self,
        session: &SessionContext,
        id: PaymentId,
        time: &SafeTimeProvider,
    ) -> Result<PaymentView> {
        let now = self.authorize(session, time)?;
        let today = self.today(now);

        let stored = self.load_payment(id)?;
        let group = self.load_group(stored.payment_group_id)?;
        let resolver = PaymentStatusResolver::new(group.overdue_terms());

        let settled = match resolver.mark_paid(&stored, today)? {
            Settlement::AlreadySettled(payment) => {
                debug!(status = %payment.payment_status, "installment already settled");
                return Ok(PaymentView::new(&payment, &group));
            }
            Settlement::Settled(payment) => payment,
        };

        let settled = match self.store.settle_payment(&stored, settled) {
            Ok(payment) => payment,
            Err(err) => {
                warn!(error = %err, "settlement rejected");
                return Err(err);
            }
        };
        info!(
            status = %settled.payment_status,
            amount_paid = %settled.amount_due(),
            "installment settled"
        );

        self.emit(BillingEvent::InstallmentSettled {
            payment_id: settled.id,
            group_id: settled.payment_group_id,
            status: settled.payment_status,
            payment_date: today,
            amount_paid: settled.amount_due(),
            timestamp: now,
        })?;
        Ok(PaymentView::new(&settled, &group))
    }

    /// manual correction of an installment's value, dates or observation
    #[instrument(skip(self, session, correction, time), fields(payment_id = %id))]
    pub fn update_payment(
        &self,
        session: &SessionContext,
        id: PaymentId,
        correction: PaymentCorrection,
        time: &SafeTimeProvider,
    ) -> Result<PaymentView> {
        let now = self.authorize(session, time)?;
        let today = self.today(now);

        if let Some(observation) = &correction.observation {
            if observation.trim().chars().count() > self.config.max_observation_length {
                return Err(BillingError::Validation {
                    message: format!(
                        "observation exceeds {} characters",
                        self.config.max_observation_length
                    ),
                });
            }
        }

        let stored = self.load_payment(id)?;
        let group = self.load_group(stored.payment_group_id)?;
        let resolver = PaymentStatusResolver::new(group.overdue_terms());
        if correction.is_empty() {
            debug!("empty correction");
            return Ok(PaymentView::new(&resolver.resolve(&stored, today)?, &group));
        }

        let corrected = resolver.apply_correction(&stored, &correction, today)?;
        let corrected = match self.store.replace_payment(&stored, corrected) {
            Ok(payment) => payment,
            Err(err) => {
                warn!(error = %err, "correction rejected");
                return Err(err);
            }
        };
        info!(
            old_status = %stored.payment_status,
            new_status = %corrected.payment_status,
            "installment corrected"
        );

        self.emit(BillingEvent::InstallmentCorrected {
            payment_id: id,
            old_status: stored.payment_status,
            new_status: corrected.payment_status,
            timestamp: now,
        })?;
        Ok(PaymentView::new(&corrected, &group))
    }

    // boletos

    /// register a boleto for an installment with the given bank
    ///
    /// a bank-side failure is stored with status ERROR and can be retried.
    #[instrument(skip(self, session, time), fields(payment_id = %payment_id, bank = %bank))]
    pub fn generate_boleto(
        &self,
        session: &SessionContext,
        payment_id: PaymentId,
        bank: BankType,
        time: &SafeTimeProvider,
    ) -> Result<BoletoView> {
        let now = self.authorize(session, time)?;
        if let Some(existing) = self.store.get_boleto(payment_id)? {
            warn!(status = %existing.status, "boleto already issued");
            return Err(BillingError::BoletoAlreadyExists {
                payment_id,
                status: existing.status,
            });
        }

        let boleto = self.request_boleto(payment_id, bank, now)?;
        let boleto = self.store.insert_boleto(boleto)?;
        self.record_boleto(&boleto, false, now)
    }

    #[instrument(skip(self, session, time), fields(payment_id = %payment_id))]
    pub fn get_boleto(
        &self,
        session: &SessionContext,
        payment_id: PaymentId,
        time: &SafeTimeProvider,
    ) -> Result<BoletoView> {
        self.authorize(session, time)?;
        self.store
            .get_boleto(payment_id)?
            .map(|boleto| BoletoView::from(&boleto))
            .ok_or(BillingError::BoletoNotFound { payment_id })
    }

    /// issue a fresh boleto in place of one the bank rejected
    #[instrument(skip(self, session, time), fields(payment_id = %payment_id, bank = %bank))]
    pub fn retry_boleto(
        &self,
        session: &SessionContext,
        payment_id: PaymentId,
        bank: BankType,
        time: &SafeTimeProvider,
    ) -> Result<BoletoView> {
        let now = self.authorize(session, time)?;
        let existing = self
            .store
            .get_boleto(payment_id)?
            .ok_or(BillingError::BoletoNotFound { payment_id })?;
        if !existing.status.is_retryable() {
            warn!(status = %existing.status, "boleto retry refused");
            return Err(BillingError::BoletoAlreadyExists {
                payment_id,
                status: existing.status,
            });
        }

        let boleto = self.request_boleto(payment_id, bank, now)?;
        let boleto = self.store.replace_failed_boleto(boleto)?;
        self.record_boleto(&boleto, true, now)
    }

    fn request_boleto(&self, payment_id: PaymentId, bank: BankType, now: DateTime<Utc>) -> Result<Boleto> {
        let payment = self.load_payment(payment_id)?;
        let group = self.load_group(payment.payment_group_id)?;
        let request = BoletoRequest::for_payment(&payment, &group, self.today(now))?;

        let response = self.banks.get(bank)?.generate_boleto(&request);
        if !response.success {
            warn!(
                error = response.error_message.as_deref().unwrap_or_default(),
                "bank rejected boleto"
            );
        }
        Ok(Boleto::from_response(payment_id, bank, response, now))
    }

    fn record_boleto(&self, boleto: &Boleto, retry: bool, now: DateTime<Utc>) -> Result<BoletoView> {
        info!(boleto_id = %boleto.id, status = %boleto.status, retry, "boleto recorded");
        self.emit(BillingEvent::BoletoIssued {
            boleto_id: boleto.id,
            payment_id: boleto.payment_id,
            bank: boleto.bank_type,
            status: boleto.status,
            retry,
            timestamp: now,
        })?;
        Ok(BoletoView::from(boleto))
    }

    fn authorize(&self, session: &SessionContext, time: &SafeTimeProvider) -> Result<DateTime<Utc>> {
        let now = time.now();
        if let Err(err) = session.authorize(now) {
            warn!(error = %err, "request rejected");
            return Err(err);
        }
        Ok(now)
    }

    fn today(&self, now: DateTime<Utc>) -> NaiveDate {
        self.config.business_date(now)
    }

    fn emit(&self, event: BillingEvent) -> Result<()> {
        self.lock_events()?.emit(event);
        Ok(())
    }

    fn lock_events(&self) -> Result<MutexGuard<'_, EventStore>> {
        self.events.lock().map_err(|_| BillingError::Storage {
            message: "event queue lock poisoned".to_string(),
        })
    }

    fn load_client(&self, id: ClientId) -> Result<Client> {
        self.store
            .get_client(id)?
            .ok_or(BillingError::ClientNotFound { id })
    }

    fn load_group(&self, id: PaymentGroupId) -> Result<PaymentGroup> {
        self.store
            .get_group(id)?
            .ok_or(BillingError::PaymentGroupNotFound { id })
    }

    fn load_payment(&self, id: PaymentId) -> Result<Payment> {
        self.store
            .get_payment(id)?
            .ok_or(BillingError::PaymentNotFound { id })
    }

    fn load_groups(&self, payments: &[Payment]) -> Result<HashMap<PaymentGroupId, PaymentGroup>> {
        let mut groups = HashMap::new();
        for id in payments.iter().map(|p| p.payment_group_id) {
            if !groups.contains_key(&id) {
                groups.insert(id, self.load_group(id)?);
            }
        }
        Ok(groups)
    }
}

fn group_of(
    groups: &HashMap<PaymentGroupId, PaymentGroup>,
    id: PaymentGroupId,
) -> Result<&PaymentGroup> {
    groups.get(&id).ok_or(BillingError::PaymentGroupNotFound { id })
}
