//! Integration tests for the full workflow pipeline.
//!
//! Wires the gateway, engine, validation service and planner over the
//! in-memory store and exercises the end-to-end lifecycle: submission,
//! approval, route validation, resource assignment, execution tracking,
//! cancellation, authorization and concurrency.

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Utc;

    use cargoflow_core::{
        Aggregate, AggregateId, AggregateRoot, DomainError, DomainResult, ExpectedVersion, UserId,
    };
    use cargoflow_events::{EventBus, EventEnvelope, InMemoryEventBus, NotificationKind};
    use cargoflow_fleet::{
        AssignDriver, Driver, DriverCommand, DriverId, DriverStatus, Envelope, RegisterDriver,
        RegisterVehicle, Vehicle, VehicleCommand, VehicleId, VehicleStatus,
    };
    use cargoflow_requests::{LoadDetails, LoadKind, RequestId, RequestStatus};
    use cargoflow_trips::{RoadEventKind, Severity, TripId, TripStatus};
    use cargoflow_workflow::{
        AuditTrail, Caller, Commit, DriverRepository, NewRequest, Notifier, RequestRepository,
        Role, RoutePlanner, RouteRepository, RouteReview, RouteValidationService, TripPlanner,
        TripRepository, TripWorkflow, UnitOfWork, VehicleRepository, WorkflowGateway,
    };

    use crate::audit::BusAuditTrail;
    use crate::memory::InMemoryStore;
    use crate::notifier::RecordingNotifier;
    use crate::planner::{FailingRoutePlanner, StaticRoutePlanner};

    struct Harness {
        gateway: WorkflowGateway,
        store: Arc<InMemoryStore>,
        notifier: Arc<RecordingNotifier>,
        audit_bus: Arc<InMemoryEventBus<EventEnvelope>>,
    }

    fn setup() -> Harness {
        setup_with_planner(Arc::new(StaticRoutePlanner::default()))
    }

    fn setup_with_planner(planner: Arc<dyn RoutePlanner>) -> Harness {
        let store = Arc::new(InMemoryStore::new());
        let notifier = Arc::new(RecordingNotifier::new());
        let audit_bus: Arc<InMemoryEventBus<EventEnvelope>> = Arc::new(InMemoryEventBus::new());
        let audit: Arc<dyn AuditTrail> = Arc::new(BusAuditTrail::new(audit_bus.clone()));
        let notifier_dyn: Arc<dyn Notifier> = notifier.clone();

        let workflow = TripWorkflow::new(
            store.clone(),
            store.clone(),
            store.clone(),
            store.clone(),
            store.clone(),
            store.clone(),
            planner,
            notifier_dyn.clone(),
            audit.clone(),
        );
        let trip_planner = TripPlanner::new(
            store.clone(),
            store.clone(),
            store.clone(),
            store.clone(),
            store.clone(),
            notifier_dyn.clone(),
            audit.clone(),
        );
        let validation = RouteValidationService::new(
            store.clone(),
            store.clone(),
            store.clone(),
            store.clone(),
            notifier_dyn,
            audit,
        );
        let gateway = WorkflowGateway::new(workflow, trip_planner, validation, store.clone());

        Harness {
            gateway,
            store,
            notifier,
            audit_bus,
        }
    }

    fn client() -> Caller {
        Caller::new(UserId::new(), Role::Client)
    }

    fn planner_caller() -> Caller {
        Caller::new(UserId::new(), Role::Planner)
    }

    fn coordinator() -> Caller {
        Caller::new(UserId::new(), Role::Coordinator)
    }

    fn machinery_load() -> LoadDetails {
        LoadDetails::new(1500.0, 3.2, 2.5, 12.0, LoadKind::Machinery).unwrap()
    }

    fn request_input() -> NewRequest {
        NewRequest {
            origin: "Genoa".to_string(),
            destination: "Munich".to_string(),
            pickup_date: Utc::now(),
            load: machinery_load(),
        }
    }

    fn register_driver(h: &Harness, name: &str) -> DriverId {
        let id = DriverId::new(AggregateId::new());
        let mut driver = Driver::empty(id);
        let events = driver
            .handle(&DriverCommand::RegisterDriver(RegisterDriver {
                driver_id: id,
                name: name.to_string(),
                occurred_at: Utc::now(),
            }))
            .unwrap();
        driver.apply(&events[0]);
        DriverRepository::save(h.store.as_ref(), &driver, ExpectedVersion::Exact(0)).unwrap();
        id
    }

    fn register_vehicle(h: &Harness, envelope: Envelope) -> VehicleId {
        let id = VehicleId::new(AggregateId::new());
        let mut vehicle = Vehicle::empty(id);
        let events = vehicle
            .handle(&VehicleCommand::RegisterVehicle(RegisterVehicle {
                vehicle_id: id,
                plate: format!("TR {} XX", id.to_string().split_at(3).0),
                model: "Goldhofer THP".to_string(),
                envelope,
                occurred_at: Utc::now(),
            }))
            .unwrap();
        vehicle.apply(&events[0]);
        VehicleRepository::save(h.store.as_ref(), &vehicle, ExpectedVersion::Exact(0)).unwrap();
        id
    }

    fn wide_envelope() -> Envelope {
        Envelope::new(40_000.0, 4.5, 3.5, 25.0).unwrap()
    }

    fn approved_trip(h: &Harness, client: &Caller) -> (RequestId, TripId) {
        let request = h.gateway.submit_request(client, request_input()).unwrap();
        let trip = h
            .gateway
            .approve_request(&planner_caller(), request.id_typed())
            .unwrap();
        (request.id_typed(), trip.id_typed())
    }

    fn validated_trip(h: &Harness, client: &Caller) -> (RequestId, TripId) {
        let (request_id, trip_id) = approved_trip(h, client);
        h.gateway
            .review_route(&coordinator(), trip_id, RouteReview::Approve)
            .unwrap();
        (request_id, trip_id)
    }

    fn confirmed_trip(h: &Harness, client: &Caller) -> (RequestId, TripId, DriverId, VehicleId) {
        let (request_id, trip_id) = validated_trip(h, client);
        let driver_id = register_driver(h, "Anna Conti");
        let vehicle_id = register_vehicle(h, wide_envelope());
        h.gateway
            .plan_trip(&planner_caller(), trip_id, driver_id, vehicle_id)
            .unwrap();
        (request_id, trip_id, driver_id, vehicle_id)
    }

    fn driver_caller(driver_id: DriverId) -> Caller {
        Caller::new(driver_id.user_id(), Role::Driver)
    }

    fn find_driver(h: &Harness, id: DriverId) -> Driver {
        DriverRepository::find_by_id(h.store.as_ref(), id)
            .unwrap()
            .unwrap()
    }

    fn find_vehicle(h: &Harness, id: VehicleId) -> Vehicle {
        VehicleRepository::find_by_id(h.store.as_ref(), id)
            .unwrap()
            .unwrap()
    }

    // ----- submission and approval ------------------------------------------

    #[test]
    fn submitted_request_is_pending_and_owned() {
        let h = setup();
        let caller = client();

        let request = h.gateway.submit_request(&caller, request_input()).unwrap();
        assert_eq!(request.status(), RequestStatus::Pending);
        assert_eq!(request.client_id(), Some(caller.user_id));

        let mine = h.gateway.my_requests(&caller).unwrap();
        assert_eq!(mine.len(), 1);
    }

    #[test]
    fn approval_opens_trip_with_attached_route() {
        let h = setup();
        let caller = client();

        let request = h.gateway.submit_request(&caller, request_input()).unwrap();
        let trip = h
            .gateway
            .approve_request(&planner_caller(), request.id_typed())
            .unwrap();

        assert_eq!(trip.status(), TripStatus::WaitingValidation);
        assert_eq!(trip.request_id(), Some(request.id_typed()));
        assert!(trip.code().is_some());

        let stored_request = h.gateway.request(&caller, request.id_typed()).unwrap();
        assert_eq!(stored_request.status(), RequestStatus::Approved);

        let routes =
            RouteRepository::find_by_trip(h.store.as_ref(), trip.id_typed()).unwrap();
        assert_eq!(routes.len(), 1);
        assert!(!routes[0].is_superseded());

        let approved_note = h
            .notifier
            .sent()
            .into_iter()
            .find(|n| n.kind == NotificationKind::RequestApproved);
        assert_eq!(approved_note.map(|n| n.user_id), Some(caller.user_id));
    }

    #[test]
    fn second_approval_fails_and_opens_no_second_trip() {
        let h = setup();
        let (request_id, trip_id) = approved_trip(&h, &client());

        let err = h
            .gateway
            .approve_request(&planner_caller(), request_id)
            .unwrap_err();
        assert!(matches!(err, DomainError::InvalidState(_)));

        let trip = TripRepository::find_by_request(h.store.as_ref(), request_id)
            .unwrap()
            .unwrap();
        assert_eq!(trip.id_typed(), trip_id);
    }

    #[test]
    fn route_engine_failure_leaves_request_pending() {
        let h = setup_with_planner(Arc::new(FailingRoutePlanner));
        let caller = client();

        let request = h.gateway.submit_request(&caller, request_input()).unwrap();
        let err = h
            .gateway
            .approve_request(&planner_caller(), request.id_typed())
            .unwrap_err();
        assert!(matches!(err, DomainError::ExternalService(_)));
        assert!(err.is_retryable());

        let stored = h.gateway.request(&caller, request.id_typed()).unwrap();
        assert_eq!(stored.status(), RequestStatus::Pending);
        assert!(
            TripRepository::find_by_request(h.store.as_ref(), request.id_typed())
                .unwrap()
                .is_none()
        );
    }

    #[test]
    fn rejection_requires_reason_delivery_to_client() {
        let h = setup();
        let caller = client();
        let request = h.gateway.submit_request(&caller, request_input()).unwrap();

        h.gateway
            .reject_request(
                &planner_caller(),
                request.id_typed(),
                "corridor closed this quarter".to_string(),
            )
            .unwrap();

        let stored = h.gateway.request(&caller, request.id_typed()).unwrap();
        assert_eq!(stored.status(), RequestStatus::Rejected);

        let rejected_note = h
            .notifier
            .sent()
            .into_iter()
            .find(|n| n.kind == NotificationKind::RequestRejected)
            .unwrap();
        assert!(rejected_note.message.contains("corridor closed"));
    }

    // ----- route validation cycle -------------------------------------------

    #[test]
    fn coordinator_approval_validates_trip_and_plans_request() {
        let h = setup();
        let caller = client();
        let (request_id, trip_id) = approved_trip(&h, &caller);

        let pending = h.gateway.pending_validations(&coordinator()).unwrap();
        assert!(pending.iter().any(|t| t.id_typed() == trip_id));

        let trip = h
            .gateway
            .review_route(&coordinator(), trip_id, RouteReview::Approve)
            .unwrap();
        assert_eq!(trip.status(), TripStatus::Validated);

        let request = h.gateway.request(&caller, request_id).unwrap();
        assert_eq!(request.status(), RequestStatus::Planned);
        assert!(
            h.notifier
                .sent()
                .iter()
                .any(|n| n.kind == NotificationKind::RouteValidated)
        );
    }

    #[test]
    fn rejection_then_recompute_supersedes_the_old_route() {
        let h = setup();
        let caller = client();
        let (request_id, trip_id) = approved_trip(&h, &caller);

        let trip = h
            .gateway
            .review_route(
                &coordinator(),
                trip_id,
                RouteReview::Reject {
                    feedback: Some("avoid the A7 viaduct".to_string()),
                },
            )
            .unwrap();
        assert_eq!(trip.status(), TripStatus::ModificationRequested);
        assert_eq!(trip.last_feedback(), Some("avoid the A7 viaduct"));

        // The request keeps its approval through the rework loop.
        let request = h.gateway.request(&caller, request_id).unwrap();
        assert_eq!(request.status(), RequestStatus::Approved);

        let old_route_id = trip.route_id().unwrap();
        let new_route = h
            .gateway
            .recompute_route(&planner_caller(), trip_id)
            .unwrap();
        assert_ne!(new_route.id_typed(), old_route_id);

        let routes = RouteRepository::find_by_trip(h.store.as_ref(), trip_id).unwrap();
        assert_eq!(routes.len(), 2);
        assert!(
            routes
                .iter()
                .find(|r| r.id_typed() == old_route_id)
                .unwrap()
                .is_superseded()
        );

        let trip = TripRepository::find_by_id(h.store.as_ref(), trip_id)
            .unwrap()
            .unwrap();
        assert_eq!(trip.status(), TripStatus::WaitingValidation);
        assert_eq!(trip.route_id(), Some(new_route.id_typed()));
    }

    #[test]
    fn recompute_requires_a_prior_rejection() {
        let h = setup();
        let (_, trip_id) = approved_trip(&h, &client());

        let err = h
            .gateway
            .recompute_route(&planner_caller(), trip_id)
            .unwrap_err();
        assert!(matches!(err, DomainError::InvalidState(_)));
    }

    // ----- resource assignment ----------------------------------------------

    #[test]
    fn planning_confirms_trip_and_commits_both_resources() {
        let h = setup();
        let (_, trip_id, driver_id, vehicle_id) = confirmed_trip(&h, &client());

        let trip = TripRepository::find_by_id(h.store.as_ref(), trip_id)
            .unwrap()
            .unwrap();
        assert_eq!(trip.status(), TripStatus::Confirmed);
        assert_eq!(trip.driver_id(), Some(driver_id));
        assert_eq!(trip.vehicle_id(), Some(vehicle_id));

        assert_eq!(find_driver(&h, driver_id).status(), DriverStatus::Assigned);
        assert_eq!(find_vehicle(&h, vehicle_id).status(), VehicleStatus::InUse);

        let assigned_note = h
            .notifier
            .sent()
            .into_iter()
            .find(|n| n.kind == NotificationKind::TripAssigned)
            .unwrap();
        assert_eq!(assigned_note.user_id, driver_id.user_id());
    }

    #[test]
    fn envelope_violation_fails_planning_and_mutates_nothing() {
        let h = setup();
        let (_, trip_id) = validated_trip(&h, &client());
        let driver_id = register_driver(&h, "Anna Conti");
        // 1500 kg load against a 1000 kg envelope.
        let vehicle_id = register_vehicle(&h, Envelope::new(1000.0, 4.0, 3.0, 15.0).unwrap());

        let err = h
            .gateway
            .plan_trip(&planner_caller(), trip_id, driver_id, vehicle_id)
            .unwrap_err();
        assert!(matches!(err, DomainError::BusinessRule(_)));

        let trip = TripRepository::find_by_id(h.store.as_ref(), trip_id)
            .unwrap()
            .unwrap();
        assert_eq!(trip.status(), TripStatus::Validated);
        assert!(!trip.has_resources());
        assert_eq!(find_driver(&h, driver_id).status(), DriverStatus::Free);
        assert_eq!(
            find_vehicle(&h, vehicle_id).status(),
            VehicleStatus::Available
        );
    }

    #[test]
    fn busy_driver_fails_planning_without_touching_the_vehicle() {
        let h = setup();
        let caller = client();
        let (_, _, driver_id, _) = confirmed_trip(&h, &caller);

        let (_, second_trip) = validated_trip(&h, &caller);
        let vehicle_id = register_vehicle(&h, wide_envelope());

        let err = h
            .gateway
            .plan_trip(&planner_caller(), second_trip, driver_id, vehicle_id)
            .unwrap_err();
        assert!(matches!(err, DomainError::BusinessRule(_)));

        assert_eq!(
            find_vehicle(&h, vehicle_id).status(),
            VehicleStatus::Available
        );
        let trip = TripRepository::find_by_id(h.store.as_ref(), second_trip)
            .unwrap()
            .unwrap();
        assert_eq!(trip.status(), TripStatus::Validated);
    }

    #[test]
    fn candidate_vehicles_filters_by_envelope_and_availability() {
        let h = setup();
        let caller = client();
        let request = h.gateway.submit_request(&caller, request_input()).unwrap();

        let fitting = register_vehicle(&h, wide_envelope());
        let _too_small = register_vehicle(&h, Envelope::new(1000.0, 4.0, 3.0, 15.0).unwrap());

        let candidates = h
            .gateway
            .candidate_vehicles(&planner_caller(), request.id_typed())
            .unwrap();
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].id_typed(), fitting);
    }

    // ----- execution tracking -----------------------------------------------

    #[test]
    fn full_execution_completes_request_and_releases_resources() {
        let h = setup();
        let caller = client();
        let (request_id, trip_id, driver_id, vehicle_id) = confirmed_trip(&h, &caller);
        let driver = driver_caller(driver_id);

        h.gateway
            .update_trip_status(&driver, trip_id, TripStatus::Accepted)
            .unwrap();

        let trip = h
            .gateway
            .update_trip_status(&driver, trip_id, TripStatus::InTransit)
            .unwrap();
        assert_eq!(trip.status(), TripStatus::InTransit);
        assert_eq!(
            find_driver(&h, driver_id).status(),
            DriverStatus::OnTheRoad
        );
        assert_eq!(
            h.gateway.request(&caller, request_id).unwrap().status(),
            RequestStatus::InProgress
        );

        h.gateway
            .update_trip_status(&driver, trip_id, TripStatus::Paused)
            .unwrap();
        h.gateway
            .update_trip_status(&driver, trip_id, TripStatus::InTransit)
            .unwrap();
        h.gateway
            .update_trip_status(&driver, trip_id, TripStatus::Delivering)
            .unwrap();
        let trip = h
            .gateway
            .update_trip_status(&driver, trip_id, TripStatus::Completed)
            .unwrap();
        assert_eq!(trip.status(), TripStatus::Completed);

        assert_eq!(find_driver(&h, driver_id).status(), DriverStatus::Free);
        assert_eq!(
            find_vehicle(&h, vehicle_id).status(),
            VehicleStatus::Available
        );
        assert_eq!(
            h.gateway.request(&caller, request_id).unwrap().status(),
            RequestStatus::Completed
        );
    }

    #[test]
    fn execution_states_enforce_adjacency() {
        let h = setup();
        let (_, trip_id, driver_id, _) = confirmed_trip(&h, &client());
        let driver = driver_caller(driver_id);

        // Delivering straight from Confirmed skips acceptance and transit.
        let err = h
            .gateway
            .update_trip_status(&driver, trip_id, TripStatus::Delivering)
            .unwrap_err();
        assert!(matches!(err, DomainError::InvalidState(_)));

        // Planning-side states are not reportable at all.
        let err = h
            .gateway
            .update_trip_status(&driver, trip_id, TripStatus::Validated)
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    // ----- cancellation -----------------------------------------------------

    #[test]
    fn cancelling_a_planned_trip_releases_resources_and_cancels_request() {
        let h = setup();
        let caller = client();
        let (request_id, trip_id, driver_id, vehicle_id) = confirmed_trip(&h, &caller);

        h.gateway.cancel_trip(&planner_caller(), trip_id).unwrap();

        let trip = TripRepository::find_by_id(h.store.as_ref(), trip_id)
            .unwrap()
            .unwrap();
        assert_eq!(trip.status(), TripStatus::Cancelled);
        assert_eq!(
            h.gateway.request(&caller, request_id).unwrap().status(),
            RequestStatus::Cancelled
        );
        assert_eq!(find_driver(&h, driver_id).status(), DriverStatus::Free);
        assert_eq!(
            find_vehicle(&h, vehicle_id).status(),
            VehicleStatus::Available
        );
        assert!(
            h.notifier
                .sent()
                .iter()
                .any(|n| n.kind == NotificationKind::TripCancelled)
        );
    }

    #[test]
    fn cancellation_window_closes_at_transit() {
        let h = setup();
        let (_, trip_id, driver_id, _) = confirmed_trip(&h, &client());
        let driver = driver_caller(driver_id);

        h.gateway
            .update_trip_status(&driver, trip_id, TripStatus::Accepted)
            .unwrap();
        h.gateway
            .update_trip_status(&driver, trip_id, TripStatus::InTransit)
            .unwrap();

        let err = h
            .gateway
            .cancel_trip(&planner_caller(), trip_id)
            .unwrap_err();
        assert!(matches!(err, DomainError::InvalidState(_)));
    }

    #[test]
    fn client_cancels_own_pending_request() {
        let h = setup();
        let caller = client();
        let request = h.gateway.submit_request(&caller, request_input()).unwrap();

        h.gateway
            .cancel_request(&caller, request.id_typed())
            .unwrap();
        assert_eq!(
            h.gateway.request(&caller, request.id_typed()).unwrap().status(),
            RequestStatus::Cancelled
        );
    }

    #[test]
    fn client_cannot_cancel_after_approval_but_planner_can() {
        let h = setup();
        let caller = client();
        let (request_id, trip_id) = approved_trip(&h, &caller);

        let err = h.gateway.cancel_request(&caller, request_id).unwrap_err();
        assert!(matches!(err, DomainError::InvalidState(_)));

        // The planner path goes through the trip and cancels both.
        h.gateway
            .cancel_request(&planner_caller(), request_id)
            .unwrap();
        let trip = TripRepository::find_by_id(h.store.as_ref(), trip_id)
            .unwrap()
            .unwrap();
        assert_eq!(trip.status(), TripStatus::Cancelled);
        assert_eq!(
            h.gateway.request(&caller, request_id).unwrap().status(),
            RequestStatus::Cancelled
        );
    }

    // ----- authorization ----------------------------------------------------

    #[test]
    fn roles_gate_each_operation() {
        let h = setup();
        let caller = client();
        let request = h.gateway.submit_request(&caller, request_input()).unwrap();

        assert_eq!(
            h.gateway
                .approve_request(&caller, request.id_typed())
                .unwrap_err(),
            DomainError::Unauthorized
        );
        assert_eq!(
            h.gateway
                .submit_request(&planner_caller(), request_input())
                .unwrap_err(),
            DomainError::Unauthorized
        );
        assert_eq!(
            h.gateway.pending_validations(&caller).unwrap_err(),
            DomainError::Unauthorized
        );
    }

    #[test]
    fn staff_reads_are_role_checked() {
        let h = setup();
        let caller = client();
        let (request_id, trip_id) = approved_trip(&h, &caller);

        let trip = h.gateway.trip(&coordinator(), trip_id).unwrap();
        assert_eq!(trip.id_typed(), trip_id);
        assert_eq!(
            h.gateway.trip(&caller, trip_id).unwrap_err(),
            DomainError::Unauthorized
        );

        let approved = h
            .gateway
            .requests_by_status(&planner_caller(), RequestStatus::Approved)
            .unwrap();
        assert!(approved.iter().any(|r| r.id_typed() == request_id));
        assert_eq!(
            h.gateway
                .requests_by_status(&caller, RequestStatus::Approved)
                .unwrap_err(),
            DomainError::Unauthorized
        );
    }

    #[test]
    fn clients_cannot_read_each_others_requests() {
        let h = setup();
        let owner = client();
        let stranger = client();
        let request = h.gateway.submit_request(&owner, request_input()).unwrap();

        assert_eq!(
            h.gateway.request(&stranger, request.id_typed()).unwrap_err(),
            DomainError::Unauthorized
        );
        assert_eq!(
            h.gateway
                .cancel_request(&stranger, request.id_typed())
                .unwrap_err(),
            DomainError::Unauthorized
        );
    }

    #[test]
    fn only_the_assigned_driver_reports_progress() {
        let h = setup();
        let (_, trip_id, _, _) = confirmed_trip(&h, &client());
        let other_driver = Caller::new(UserId::new(), Role::Driver);

        assert_eq!(
            h.gateway
                .update_trip_status(&other_driver, trip_id, TripStatus::Accepted)
                .unwrap_err(),
            DomainError::Unauthorized
        );
    }

    #[test]
    fn admin_bypasses_driver_identity_check() {
        let h = setup();
        let (_, trip_id, _, _) = confirmed_trip(&h, &client());
        let admin = Caller::new(UserId::new(), Role::Admin);

        let trip = h
            .gateway
            .update_trip_status(&admin, trip_id, TripStatus::Accepted)
            .unwrap();
        assert_eq!(trip.status(), TripStatus::Accepted);
    }

    // ----- concurrency ------------------------------------------------------

    #[test]
    fn stale_snapshot_save_is_rejected() {
        let h = setup();
        let caller = client();
        let request = h.gateway.submit_request(&caller, request_input()).unwrap();

        let stale = RequestRepository::find_by_id(h.store.as_ref(), request.id_typed())
            .unwrap()
            .unwrap();

        // Another session advances the request in between.
        h.gateway
            .approve_request(&planner_caller(), request.id_typed())
            .unwrap();

        let err = RequestRepository::save(
            h.store.as_ref(),
            &stale,
            ExpectedVersion::Exact(stale.version()),
        )
        .unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
        assert!(err.is_retryable());
    }

    #[test]
    fn a_stale_entity_aborts_the_whole_commit() {
        let h = setup();
        let caller = client();
        // Stored at version 1.
        let request = h.gateway.submit_request(&caller, request_input()).unwrap();

        let id = DriverId::new(AggregateId::new());
        let mut driver = Driver::empty(id);
        let events = driver
            .handle(&DriverCommand::RegisterDriver(RegisterDriver {
                driver_id: id,
                name: "Anna Conti".to_string(),
                occurred_at: Utc::now(),
            }))
            .unwrap();
        driver.apply(&events[0]);

        // The driver alone would store fine; the stale request sinks both.
        let err = h
            .store
            .commit(
                Commit::new()
                    .driver(driver, ExpectedVersion::Exact(0))
                    .request(request, ExpectedVersion::Exact(0)),
            )
            .unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
        assert!(
            DriverRepository::find_by_id(h.store.as_ref(), id)
                .unwrap()
                .is_none()
        );
    }

    /// Driver reads frozen at the moment the repository is built, standing in
    /// for a planning session that loaded its entities before a competitor
    /// committed.
    struct PinnedDriverReads {
        snapshot: Driver,
    }

    impl DriverRepository for PinnedDriverReads {
        fn find_by_id(&self, id: DriverId) -> DomainResult<Option<Driver>> {
            Ok((self.snapshot.id_typed() == id).then(|| self.snapshot.clone()))
        }

        fn save(&self, _driver: &Driver, _expected: ExpectedVersion) -> DomainResult<()> {
            Err(DomainError::external_service("read-only test repository"))
        }

        fn find_by_status(&self, status: DriverStatus) -> DomainResult<Vec<Driver>> {
            Ok((self.snapshot.status() == status)
                .then(|| self.snapshot.clone())
                .into_iter()
                .collect())
        }
    }

    #[test]
    fn losing_the_driver_race_confirms_nothing() {
        let h = setup();
        let caller = client();
        let (_, trip_id) = validated_trip(&h, &caller);
        let driver_id = register_driver(&h, "Anna Conti");
        let vehicle_id = register_vehicle(&h, wide_envelope());

        // This planner keeps seeing the driver as free even after the
        // concurrent assignment below.
        let pinned = Arc::new(PinnedDriverReads {
            snapshot: find_driver(&h, driver_id),
        });
        let racing_planner = TripPlanner::new(
            h.store.clone(),
            h.store.clone(),
            pinned,
            h.store.clone(),
            h.store.clone(),
            Arc::new(RecordingNotifier::new()),
            Arc::new(BusAuditTrail::new(Arc::new(InMemoryEventBus::new()))),
        );

        // Another planning session wins the driver in between.
        let mut driver = find_driver(&h, driver_id);
        let version = driver.version();
        let events = driver
            .handle(&DriverCommand::AssignDriver(AssignDriver {
                driver_id,
                trip: AggregateId::new(),
                occurred_at: Utc::now(),
            }))
            .unwrap();
        for event in &events {
            driver.apply(event);
        }
        DriverRepository::save(h.store.as_ref(), &driver, ExpectedVersion::Exact(version))
            .unwrap();

        let err = racing_planner
            .plan_trip(trip_id, driver_id, vehicle_id)
            .unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));

        // The losing session committed nothing: the trip still waits for
        // resources, the vehicle is untouched, and the driver belongs to the
        // winner.
        let trip = TripRepository::find_by_id(h.store.as_ref(), trip_id)
            .unwrap()
            .unwrap();
        assert_eq!(trip.status(), TripStatus::Validated);
        assert!(!trip.has_resources());
        assert_eq!(
            find_vehicle(&h, vehicle_id).status(),
            VehicleStatus::Available
        );
        assert_eq!(find_driver(&h, driver_id).status(), DriverStatus::Assigned);
    }

    // ----- audit trail ------------------------------------------------------

    #[test]
    fn committed_transitions_reach_the_audit_bus() {
        let h = setup();
        let subscription = h.audit_bus.subscribe();
        let caller = client();

        let request = h.gateway.submit_request(&caller, request_input()).unwrap();
        h.gateway
            .approve_request(&planner_caller(), request.id_typed())
            .unwrap();

        let mut event_types = Vec::new();
        while let Ok(envelope) = subscription.try_recv() {
            event_types.push(envelope.event_type().to_string());
        }
        assert!(event_types.iter().any(|t| t == "requests.request.submitted"));
        assert!(event_types.iter().any(|t| t == "requests.request.approved"));
        assert!(event_types.iter().any(|t| t == "trips.trip.opened"));
        assert!(event_types.iter().any(|t| t == "trips.trip.route_attached"));
    }

    // ----- road events ------------------------------------------------------

    #[test]
    fn road_events_are_reported_queried_and_resolved() {
        let h = setup();
        let (_, _, driver_id, _) = confirmed_trip(&h, &client());
        let driver = driver_caller(driver_id);

        let event = h
            .gateway
            .report_road_event(
                &driver,
                RoadEventKind::Closure,
                Severity::Critical,
                "SS45 km 12".to_string(),
            )
            .unwrap();
        h.gateway
            .report_road_event(
                &driver,
                RoadEventKind::Roadworks,
                Severity::Warning,
                "A26 north".to_string(),
            )
            .unwrap();

        assert_eq!(h.gateway.active_road_events(&driver).unwrap().len(), 2);
        let blocking = h.gateway.blocking_road_events(&driver).unwrap();
        assert_eq!(blocking.len(), 1);
        assert_eq!(blocking[0].id_typed(), event.id_typed());

        h.gateway
            .resolve_road_event(&coordinator(), event.id_typed())
            .unwrap();
        assert!(h.gateway.blocking_road_events(&driver).unwrap().is_empty());
        assert_eq!(h.gateway.active_road_events(&driver).unwrap().len(), 1);
    }

    #[test]
    fn clients_cannot_report_road_events() {
        let h = setup();
        assert_eq!(
            h.gateway
                .report_road_event(
                    &client(),
                    RoadEventKind::Accident,
                    Severity::Info,
                    "A1".to_string(),
                )
                .unwrap_err(),
            DomainError::Unauthorized
        );
    }
}
