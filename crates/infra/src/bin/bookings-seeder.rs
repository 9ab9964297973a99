//! Creates the schema and loads a small demo data set, then relays the
//! resulting events once so they show up in the logs.
//!
//! Reads the same environment as the services (`DATABASE_URL` is required).

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{Duration, Utc};
use tracing::info;

use bookings_appointment::{ListByPlace, LocalGatewayFetcher, LocalScheduler, ScheduleAppointment};
use bookings_appointment::{Fetcher as _, Scheduler as _};
use bookings_core::{
    Actor, AggregateRoot, DomainError, EmployeeId, Entity, PlaceId, ServiceError, SpatialLocation,
    UserId, UuidV7Factory,
};
use bookings_directory::{Employee, LocalFetcher, Place, User};
use bookings_events::EventPublisher;
use bookings_infra::repository::{
    PostgresAppointmentRepository, PostgresEmployeeDirectory, PostgresOrganizationRepository,
    PostgresPlaceDirectory, PostgresUserDirectory,
};
use bookings_infra::{AppConfig, OutboxPublisher, OutboxRelay, Paginator, PostgresOutbox, TracingPublisher, db};
use bookings_organization::{LocalManager, Manager as _, RegisterOrganization};

#[tokio::main]
async fn main() -> Result<()> {
    bookings_observability::init();

    let config = AppConfig::from_env().context("loading configuration")?;
    info!(?config, "seeder starting");

    let pool = db::connect(&config.database).await.context("connecting to database")?;
    db::apply_schema(&pool).await.context("applying schema")?;

    let paginator = Paginator::new(Arc::new(config.page_token_cipher()?));
    let outbox = Arc::new(PostgresOutbox::new(pool.clone()));
    let publisher: Arc<dyn EventPublisher> = Arc::new(OutboxPublisher::new(outbox.clone()));
    let actor = Actor::system();

    let place = Place::new(
        PlaceId::new("place-downtown")?,
        "Downtown Clinic",
        Some(SpatialLocation::new(40.7128, -74.0060)?),
    );
    let employee = Employee::new(EmployeeId::new("emp-hopper")?, "Grace Hopper", Utc::now());
    let user = User::new(UserId::new("user-lovelace")?, "Ada Lovelace");

    let places = Arc::new(PostgresPlaceDirectory::new(pool.clone()));
    let employees = Arc::new(PostgresEmployeeDirectory::new(pool.clone()));
    let users = Arc::new(PostgresUserDirectory::new(pool.clone()));
    places.upsert(&place).await?;
    employees.upsert(&employee).await?;
    users.upsert(&user).await?;

    let organizations = Arc::new(
        PostgresOrganizationRepository::new(pool.clone(), paginator.clone())
            .with_delete_policy(config.delete_policy),
    );
    let manager = LocalManager::new(organizations, publisher.clone(), Arc::new(UuidV7Factory));
    match manager
        .register(
            &actor,
            RegisterOrganization {
                id: None,
                name: "Demo Health".to_string(),
            },
        )
        .await
    {
        Ok(org) => info!(organization_id = %org.id(), "organization seeded"),
        Err(ServiceError::Domain(DomainError::AlreadyExists { .. })) => {
            info!("organization already seeded")
        }
        Err(err) => return Err(err).context("registering organization"),
    }

    let appointments = Arc::new(
        PostgresAppointmentRepository::new(pool.clone(), paginator)
            .with_delete_policy(config.delete_policy),
    );
    let scheduler = LocalScheduler::new(appointments.clone(), publisher, Arc::new(UuidV7Factory));
    for (title, days) in [("initial consultation", 1), ("follow-up", 8)] {
        let appointment = scheduler
            .schedule(
                &actor,
                ScheduleAppointment {
                    id: None,
                    title: title.to_string(),
                    place_id: place.id().clone(),
                    targeted_to: Some(employee.id().clone()),
                    scheduled_by: user.id().clone(),
                    schedule_time: Utc::now() + Duration::days(days),
                },
            )
            .await
            .context("scheduling appointment")?;
        info!(appointment_id = %appointment.id(), "appointment seeded");
    }

    let fetcher = LocalGatewayFetcher::new(
        appointments,
        Arc::new(LocalFetcher::<Place>::new(places)),
        Arc::new(LocalFetcher::<Employee>::new(employees)),
        Arc::new(LocalFetcher::<User>::new(users)),
    );
    let page = fetcher
        .list_by_place(ListByPlace::new(place.id().clone()).with_page_size(10))
        .await
        .context("listing appointments")?;
    info!(count = page.len(), has_next = page.has_next(), "appointments at place");

    let relay = OutboxRelay::new(outbox, Arc::new(TracingPublisher), config.outbox_relay_batch_size);
    let mut delivered = 0;
    loop {
        let n = relay.relay_once().await?;
        if n == 0 {
            break;
        }
        delivered += n;
    }
    info!(delivered, "outbox drained");

    Ok(())
}
