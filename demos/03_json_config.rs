/// json config - load engine settings and see the business calendar at work
use chrono::{NaiveDate, TimeZone, Utc};
use installment_billing_rs::errors::ErrorResponse;
use installment_billing_rs::views::to_json_pretty;
use installment_billing_rs::{
    BillingService, EngineConfig, InMemoryStore, Money, NewClient, NewPaymentGroup,
    PaymentFilter, SafeTimeProvider, SessionContext, TimeSource,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("=== json config ===\n");

    let config = EngineConfig::from_json(
        r#"{
            "business_utc_offset_minutes": -180,
            "default_late_fee_rate": 0.02,
            "default_monthly_interest_rate": 0.01,
            "max_observation_length": 200
        }"#,
    )?;
    println!("{:#?}\n", config);

    // 01:30 UTC on the 11th is still the 10th on the business calendar
    let time = SafeTimeProvider::new(TimeSource::Test(
        Utc.with_ymd_and_hms(2024, 2, 11, 1, 30, 0).unwrap(),
    ));
    println!(
        "clock {} -> business date {}",
        time.now(),
        config.business_date(time.now())
    );

    let service = BillingService::new(InMemoryStore::new(), config);
    let session = SessionContext::without_expiry("demo-token");

    // rates come from the config defaults
    let client = service.create_client(
        &session,
        NewClient {
            client_name: "mercado bom preço".to_string(),
            address: "Rua Nova, 99".to_string(),
            document: "11222333000181".to_string(),
            ..NewClient::default()
        },
        &time,
    )?;
    println!("{}\n", to_json_pretty(&client)?);

    service.create_payment_group(
        &session,
        NewPaymentGroup::builder()
            .client(client.id)
            .payer("Tiago Costa", "52998224725")
            .monthly_value(Money::from_major(100))
            .installments(2)
            .first_due_date(NaiveDate::from_ymd_opt(2024, 2, 10).unwrap())
            .build()?,
        &time,
    )?;

    // due today on the business calendar, so still PENDING
    let listed = service.list_payments(&session, &PaymentFilter::default(), &time)?;
    println!("{}\n", to_json_pretty(&listed)?);

    // errors carry the http status they map to
    let rejected = service
        .list_payments(&SessionContext::anonymous(), &PaymentFilter::default(), &time)
        .unwrap_err();
    println!("{}", serde_json::to_string(&ErrorResponse::from(&rejected))?);

    Ok(())
}
