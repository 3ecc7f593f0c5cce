/// quick start - register a client, schedule installments, list them and issue a boleto
use chrono::NaiveDate;
use installment_billing_rs::views::to_json_pretty;
use installment_billing_rs::{
    BankType, BillingService, EngineConfig, InMemoryStore, Money, NewClient, NewPaymentGroup,
    PaymentFilter, Rate, SafeTimeProvider, SessionContext, TimeSource,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let service = BillingService::new(InMemoryStore::new(), EngineConfig::default());
    let time = SafeTimeProvider::new(TimeSource::System);
    let session = SessionContext::without_expiry("demo-token");

    // register the billing client
    let client = service.create_client(
        &session,
        NewClient {
            client_name: "escola aprender".to_string(),
            address: "Rua das Acácias, 42".to_string(),
            document: "11.222.333/0001-81".to_string(),
            late_fee_rate: Some(Rate::from_percentage(2)),
            monthly_interest_rate: Some(Rate::from_percentage(1)),
            ..NewClient::default()
        },
        &time,
    )?;

    // six monthly installments of 350.00
    let first_due = NaiveDate::from_ymd_opt(2024, 1, 31).ok_or("invalid date")?;
    let group = service.create_payment_group(
        &session,
        NewPaymentGroup::builder()
            .client(client.id)
            .payer("Lucas Almeida", "529.982.247-25")
            .monthly_value(Money::from_major(350))
            .installments(6)
            .first_due_date(first_due)
            .build()?,
        &time,
    )?;
    println!("{}", to_json_pretty(&group)?);

    // everything due this month
    let listed = service.list_payments(&session, &PaymentFilter::default(), &time)?;
    println!("{}", to_json_pretty(&listed)?);

    // boleto for the first installment through the mock bank
    let boleto = service.generate_boleto(&session, group.installments[0].id, BankType::Inter, &time)?;
    println!("{}", to_json_pretty(&boleto)?);

    Ok(())
}
