//! End-to-end flows over the in-memory stack.
//!
//! Services → repositories → paginator → outbox → relay.
//!
//! Verifies:
//! - Listing tokens walk forward and back with stable boundaries
//! - Lifecycle events reach the outbox in emission order
//! - Stale writes surface as conflicts
//! - Listings enrich rows with reference data

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{Duration, Utc};

    use bookings_appointment::{
        AdminManager, AppointmentStatus, AppointmentUpdate, Fetcher as AppointmentFetcher,
        ListByPlace, ListByUser, LocalAdminManager, LocalGatewayFetcher, LocalScheduler,
        ScheduleAppointment, Scheduler,
    };
    use bookings_core::{
        Actor, AggregateRoot, Audited, DeletePolicy, EmployeeId, OrganizationId, PageToken,
        PlaceId, RepositoryError, ServiceError, UserId, UuidV7Factory, WriteRepository,
    };
    use bookings_directory::{Employee, LocalFetcher, Place, User};
    use bookings_events::{EventPublisher, InMemoryEventBus};
    use bookings_organization::{
        ListOrganizations, LocalLister, LocalManager, Lister, Manager, OrganizationUpdate,
        RegisterOrganization,
    };

    use crate::outbox::{InMemoryOutbox, OutboxPublisher, OutboxRelay};
    use crate::paging::{PageTokenCipher, Paginator};
    use crate::repository::{
        InMemoryAppointmentRepository, InMemoryDirectory, InMemoryOrganizationRepository,
    };

    fn paginator() -> Paginator {
        Paginator::new(Arc::new(PageTokenCipher::generate()))
    }

    fn actor() -> Actor {
        Actor::new("admin")
    }

    struct Organizations {
        repo: Arc<InMemoryOrganizationRepository>,
        manager: LocalManager,
        lister: LocalLister,
        outbox: Arc<InMemoryOutbox>,
    }

    fn organizations() -> Organizations {
        let repo = Arc::new(InMemoryOrganizationRepository::new(paginator()));
        let outbox = Arc::new(InMemoryOutbox::new());
        let manager = LocalManager::new(
            repo.clone(),
            Arc::new(OutboxPublisher::new(outbox.clone())),
            Arc::new(UuidV7Factory),
        );
        let lister = LocalLister::new(repo.clone());
        Organizations {
            repo,
            manager,
            lister,
            outbox,
        }
    }

    async fn register(orgs: &Organizations, id: &str, name: &str) {
        orgs.manager
            .register(
                &actor(),
                RegisterOrganization {
                    id: Some(OrganizationId::new(id).unwrap()),
                    name: name.to_string(),
                },
            )
            .await
            .unwrap();
    }

    fn names(page: &bookings_core::Page<bookings_organization::Organization>) -> Vec<String> {
        page.items().iter().map(|o| o.name().to_string()).collect()
    }

    #[tokio::test]
    async fn organization_listing_walks_forward_and_back() {
        let orgs = organizations();
        for (id, name) in [("1", "alpha"), ("2", "beta"), ("3", "gamma"), ("4", "delta")] {
            register(&orgs, id, name).await;
        }

        let first = orgs
            .lister
            .list(ListOrganizations::new().with_page_size(1))
            .await
            .unwrap();
        assert_eq!(names(&first), vec!["alpha"]);
        assert!(first.previous_page_token().is_none());
        assert!(first.next_page_token().is_some());

        let second = orgs
            .lister
            .list(
                ListOrganizations::new()
                    .with_page_size(1)
                    .with_page_token(first.next_page_token().cloned()),
            )
            .await
            .unwrap();
        assert_eq!(names(&second), vec!["beta"]);
        assert!(second.previous_page_token().is_some());
        assert!(second.next_page_token().is_some());

        let back = orgs
            .lister
            .list(
                ListOrganizations::new()
                    .with_page_size(1)
                    .with_page_token(second.previous_page_token().cloned()),
            )
            .await
            .unwrap();
        assert_eq!(names(&back), vec!["alpha"]);
        assert_eq!(back.items()[0].id(), first.items()[0].id());
        assert!(back.previous_page_token().is_none());
    }

    #[tokio::test]
    async fn organization_listing_rejects_tokens_from_another_server() {
        let orgs = organizations();
        register(&orgs, "1", "alpha").await;
        register(&orgs, "2", "beta").await;

        let foreign = Paginator::new(Arc::new(PageTokenCipher::generate()));
        let other = InMemoryOrganizationRepository::new(foreign);
        for (id, name) in [("1", "alpha"), ("2", "beta")] {
            let org = bookings_organization::Organization::new(
                OrganizationId::new(id).unwrap(),
                name,
                &actor(),
            );
            WriteRepository::save(&other, &org).await.unwrap();
        }
        let foreign_page = LocalLister::new(Arc::new(other))
            .list(ListOrganizations::new().with_page_size(1))
            .await
            .unwrap();

        let err = orgs
            .lister
            .list(
                ListOrganizations::new()
                    .with_page_size(1)
                    .with_page_token(foreign_page.next_page_token().cloned()),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Repository(RepositoryError::MalformedToken(_))));

        let err = orgs
            .lister
            .list(ListOrganizations::new().with_page_token(Some(PageToken::new("garbage"))))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Repository(RepositoryError::MalformedToken(_))));
    }

    #[tokio::test]
    async fn organization_lifecycle_fills_the_outbox_in_order() {
        let orgs = organizations();
        let id = OrganizationId::new("1").unwrap();
        register(&orgs, "1", "acme").await;

        let updated = orgs
            .manager
            .modify_by_id(&actor(), &id, OrganizationUpdate::new().with_name("acme-2"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.version(), 1);

        let untouched = orgs
            .manager
            .modify_by_id(&actor(), &id, OrganizationUpdate::new())
            .await
            .unwrap();
        assert!(untouched.is_none());

        orgs.manager.delete_by_id(&actor(), &id).await.unwrap();

        let topics: Vec<String> = orgs
            .outbox
            .pending()
            .unwrap()
            .iter()
            .map(|e| e.topic().to_string())
            .collect();
        assert_eq!(topics.len(), 3);
        assert!(topics[0].ends_with(".created"));
        assert!(topics[1].ends_with(".updated"));
        assert!(topics[2].ends_with(".deleted"));

        let stored = orgs.repo.raw(&id).unwrap().unwrap();
        assert!(stored.audit.is_deleted);
        assert_eq!(stored.audit.version, 2);
    }

    #[tokio::test]
    async fn default_organization_listing_skips_deleted() {
        let orgs = organizations();
        register(&orgs, "1", "alpha").await;
        register(&orgs, "2", "beta").await;
        orgs.manager
            .delete_by_id(&actor(), &OrganizationId::new("1").unwrap())
            .await
            .unwrap();

        let page = orgs.lister.list(ListOrganizations::new()).await.unwrap();
        assert_eq!(names(&page), vec!["beta"]);

        let all = orgs
            .lister
            .list(ListOrganizations::new().including_deleted())
            .await
            .unwrap();
        assert_eq!(names(&all), vec!["alpha", "beta"]);
    }

    #[tokio::test]
    async fn deleted_organization_name_can_be_reused() {
        let orgs = organizations();
        register(&orgs, "1", "acme").await;

        let err = orgs
            .manager
            .register(
                &actor(),
                RegisterOrganization {
                    id: None,
                    name: "acme".into(),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ServiceError::Domain(bookings_core::DomainError::AlreadyExists { .. })
        ));

        orgs.manager
            .delete_by_id(&actor(), &OrganizationId::new("1").unwrap())
            .await
            .unwrap();
        register(&orgs, "2", "acme").await;
    }

    #[tokio::test]
    async fn registering_a_taken_id_reports_already_exists() {
        let orgs = organizations();
        register(&orgs, "1", "acme").await;

        let err = orgs
            .manager
            .register(
                &actor(),
                RegisterOrganization {
                    id: Some(OrganizationId::new("1").unwrap()),
                    name: "globex".into(),
                },
            )
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ServiceError::Domain(bookings_core::DomainError::AlreadyExists { .. })
        ));
        assert_eq!(orgs.outbox.pending_count().unwrap(), 1);
    }

    #[tokio::test]
    async fn stale_copy_loses_the_race() {
        let repo = InMemoryOrganizationRepository::new(paginator());
        let id = OrganizationId::new("1").unwrap();
        let mut org = bookings_organization::Organization::new(id.clone(), "acme", &actor());
        WriteRepository::save(&repo, &org).await.unwrap();
        org.mark_persisted();

        let mut first = WriteRepository::find_by_key(&repo, &id).await.unwrap().unwrap();
        let mut second = WriteRepository::find_by_key(&repo, &id).await.unwrap().unwrap();

        first.update(&actor(), OrganizationUpdate::new().with_name("first"));
        WriteRepository::save(&repo, &first).await.unwrap();
        first.mark_persisted();

        second.update(&actor(), OrganizationUpdate::new().with_name("second"));
        let err = WriteRepository::save(&repo, &second).await.unwrap_err();
        assert!(matches!(err, RepositoryError::Conflict(_)));

        let stored = repo.raw(&id).unwrap().unwrap();
        assert_eq!(stored.name, "first");
    }

    struct Bookings {
        repo: Arc<InMemoryAppointmentRepository>,
        scheduler: LocalScheduler,
        admin: LocalAdminManager,
        fetcher: LocalGatewayFetcher,
        outbox: Arc<InMemoryOutbox>,
        place: PlaceId,
        employee: EmployeeId,
        user: UserId,
    }

    fn bookings() -> Bookings {
        let place = PlaceId::new("place-1").unwrap();
        let employee = EmployeeId::new("emp-1").unwrap();
        let user = UserId::new("user-1").unwrap();

        let places = Arc::new(InMemoryDirectory::with([Place::new(place.clone(), "Main Street", None)]));
        let employees = Arc::new(InMemoryDirectory::with([Employee::new(
            employee.clone(),
            "Grace Hopper",
            Utc::now() - Duration::days(400),
        )]));
        let users = Arc::new(InMemoryDirectory::with([User::new(user.clone(), "Ada Lovelace")]));

        let repo = Arc::new(InMemoryAppointmentRepository::new(paginator()));
        let outbox = Arc::new(InMemoryOutbox::new());
        let publisher: Arc<dyn EventPublisher> = Arc::new(OutboxPublisher::new(outbox.clone()));

        Bookings {
            scheduler: LocalScheduler::new(repo.clone(), publisher.clone(), Arc::new(UuidV7Factory)),
            admin: LocalAdminManager::new(repo.clone(), publisher),
            fetcher: LocalGatewayFetcher::new(
                repo.clone(),
                Arc::new(LocalFetcher::<Place>::new(places)),
                Arc::new(LocalFetcher::<Employee>::new(employees)),
                Arc::new(LocalFetcher::<User>::new(users)),
            ),
            repo,
            outbox,
            place,
            employee,
            user,
        }
    }

    fn booking(b: &Bookings, title: &str, hours_ahead: i64) -> ScheduleAppointment {
        ScheduleAppointment {
            id: None,
            title: title.to_string(),
            place_id: b.place.clone(),
            targeted_to: Some(b.employee.clone()),
            scheduled_by: b.user.clone(),
            schedule_time: Utc::now() + Duration::hours(hours_ahead),
        }
    }

    #[tokio::test]
    async fn schedule_then_cancel_publishes_both_events() {
        let b = bookings();
        let created = b
            .scheduler
            .schedule(&actor(), booking(&b, "checkup", 24))
            .await
            .unwrap();

        let cancelled = b
            .scheduler
            .cancel(&actor(), created.id(), "no longer needed")
            .await
            .unwrap();

        assert_eq!(cancelled.status(), AppointmentStatus::Cancelled);
        assert!(cancelled.notes_text().contains("CANCEL: no longer needed"));
        assert_eq!(cancelled.version(), 1);

        let topics: Vec<String> = b
            .outbox
            .pending()
            .unwrap()
            .iter()
            .map(|e| e.topic().to_string())
            .collect();
        assert_eq!(topics.len(), 2);
        assert!(topics[0].ends_with(".scheduled"));
        assert!(topics[1].ends_with(".cancelled"));
    }

    #[tokio::test]
    async fn relay_forwards_appointment_events_to_subscribers() {
        let b = bookings();
        let bus = Arc::new(InMemoryEventBus::new());
        let subscription = bus.subscribe();

        let created = b
            .scheduler
            .schedule(&actor(), booking(&b, "checkup", 24))
            .await
            .unwrap();
        b.admin.complete_by_key(&actor(), created.id()).await.unwrap();

        let relay = OutboxRelay::new(b.outbox.clone(), bus, 10);
        assert_eq!(relay.relay_once().await.unwrap(), 2);

        let delivered = subscription.drain();
        assert_eq!(delivered.len(), 2);
        assert!(delivered.iter().all(|e| e.key() == b.place.as_str()));
        assert!(delivered.iter().all(|e| e.subject() == created.id().as_str()));
        assert_eq!(b.outbox.pending_count().unwrap(), 0);
    }

    #[tokio::test]
    async fn rescheduling_to_the_same_time_writes_nothing() {
        let b = bookings();
        let created = b
            .scheduler
            .schedule(&actor(), booking(&b, "checkup", 24))
            .await
            .unwrap();

        let same = b
            .scheduler
            .reschedule(&actor(), created.id(), "no change", created.schedule_time())
            .await
            .unwrap();

        assert_eq!(same.version(), 0);
        assert_eq!(b.outbox.pending_count().unwrap(), 1);
    }

    #[tokio::test]
    async fn rescheduling_into_the_past_is_refused() {
        let b = bookings();
        let created = b
            .scheduler
            .schedule(&actor(), booking(&b, "checkup", 24))
            .await
            .unwrap();

        let err = b
            .scheduler
            .reschedule(&actor(), created.id(), "oops", Utc::now() - Duration::hours(1))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ServiceError::Domain(bookings_core::DomainError::InvalidArgument { .. })
        ));
        let stored = b.repo.raw(created.id()).unwrap().unwrap();
        assert_eq!(stored.audit.version, 0);
    }

    #[tokio::test]
    async fn missing_appointment_is_not_found() {
        let b = bookings();
        let missing = bookings_core::AppointmentId::new("nope").unwrap();

        let err = b.scheduler.cancel(&actor(), &missing, "x").await.unwrap_err();
        assert!(err.is_not_found());

        let err = b.fetcher.get_by_key(&missing).await.unwrap_err();
        assert!(err.is_not_found());

        b.admin.delete_by_key(&actor(), &missing).await.unwrap();
    }

    #[tokio::test]
    async fn details_resolve_every_reference() {
        let b = bookings();
        let created = b
            .scheduler
            .schedule(&actor(), booking(&b, "annual checkup", 24))
            .await
            .unwrap();

        let details = b.fetcher.get_by_key(created.id()).await.unwrap();

        assert_eq!(details.title, "Annual Checkup");
        assert_eq!(details.place.name(), "Main Street");
        assert_eq!(details.scheduled_by.full_name(), "Ada Lovelace");
        assert_eq!(
            details.targeted_to.as_ref().map(|e| e.full_name()),
            Some("Grace Hopper")
        );
    }

    #[tokio::test]
    async fn user_listing_is_newest_first_and_filters_status() {
        let b = bookings();
        let mut ids = Vec::new();
        for hours in [10, 20, 30] {
            let created = b
                .scheduler
                .schedule(&actor(), booking(&b, "visit", hours))
                .await
                .unwrap();
            ids.push(created.id().clone());
        }
        b.scheduler.cancel(&actor(), &ids[1], "conflict").await.unwrap();

        let page = b
            .fetcher
            .list_by_user(ListByUser::new(b.user.clone()).with_page_size(10))
            .await
            .unwrap();
        let listed: Vec<_> = page.items().iter().map(|a| a.id.clone()).collect();
        assert_eq!(listed, vec![ids[2].clone(), ids[1].clone(), ids[0].clone()]);
        assert!(page.items().iter().all(|a| a.place.is_some()));

        let scheduled_only = b
            .fetcher
            .list_by_user(
                ListByUser::new(b.user.clone())
                    .with_statuses([AppointmentStatus::Scheduled])
                    .with_page_size(10),
            )
            .await
            .unwrap();
        let listed: Vec<_> = scheduled_only.items().iter().map(|a| a.id.clone()).collect();
        assert_eq!(listed, vec![ids[2].clone(), ids[0].clone()]);
    }

    #[tokio::test]
    async fn place_listing_pages_and_hides_deleted_rows() {
        let b = bookings();
        let mut ids = Vec::new();
        for hours in [10, 20, 30] {
            let created = b
                .scheduler
                .schedule(&actor(), booking(&b, "visit", hours))
                .await
                .unwrap();
            ids.push(created.id().clone());
        }
        b.admin.delete_by_key(&actor(), &ids[2]).await.unwrap();

        let first = b
            .fetcher
            .list_by_place(ListByPlace::new(b.place.clone()).with_page_size(1))
            .await
            .unwrap();
        assert_eq!(first.items()[0].id, ids[1]);
        assert_eq!(
            first.items()[0].scheduled_by.as_ref().map(|u| u.full_name()),
            Some("Ada Lovelace")
        );
        assert!(first.has_next());
        assert!(!first.has_previous());

        let second = b
            .fetcher
            .list_by_place(
                ListByPlace::new(b.place.clone())
                    .with_page_size(1)
                    .with_page_token(first.next_page_token().cloned()),
            )
            .await
            .unwrap();
        assert_eq!(second.items()[0].id, ids[0]);
        assert!(!second.has_next());
        assert!(second.has_previous());

        assert!(b.repo.raw(&ids[2]).unwrap().unwrap().audit.is_deleted);
    }

    #[tokio::test]
    async fn listing_with_no_rows_is_not_found() {
        let b = bookings();

        let err = b
            .fetcher
            .list_by_user(ListByUser::new(b.user.clone()))
            .await
            .unwrap_err();

        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn hard_delete_removes_the_row() {
        let b = bookings();
        let repo = Arc::new(
            InMemoryAppointmentRepository::new(paginator()).with_delete_policy(DeletePolicy::Hard),
        );
        let outbox = Arc::new(InMemoryOutbox::new());
        let publisher: Arc<dyn EventPublisher> = Arc::new(OutboxPublisher::new(outbox.clone()));
        let scheduler = LocalScheduler::new(repo.clone(), publisher.clone(), Arc::new(UuidV7Factory));
        let admin = LocalAdminManager::new(repo.clone(), publisher);

        let created = scheduler
            .schedule(&actor(), booking(&b, "visit", 5))
            .await
            .unwrap();
        admin.delete_by_key(&actor(), created.id()).await.unwrap();

        assert!(repo.raw(created.id()).unwrap().is_none());
        assert_eq!(outbox.pending_count().unwrap(), 2);
    }

    #[tokio::test]
    async fn empty_update_is_not_saved() {
        let b = bookings();
        let created = b
            .scheduler
            .schedule(&actor(), booking(&b, "visit", 5))
            .await
            .unwrap();

        let same = b
            .admin
            .update_by_key(&actor(), created.id(), AppointmentUpdate::new())
            .await
            .unwrap();
        assert_eq!(same.version(), 0);

        let updated = b
            .admin
            .update_by_key(
                &actor(),
                created.id(),
                AppointmentUpdate::new().with_note("bring forms"),
            )
            .await
            .unwrap();
        assert_eq!(updated.version(), 1);
        assert!(updated.notes_text().contains("bring forms"));
        assert_eq!(b.outbox.pending_count().unwrap(), 2);
    }
}
