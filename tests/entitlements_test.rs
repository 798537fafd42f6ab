mod common;

use anyhow::Result;
use common::{Staff, leave, parse_date, test_service};
use verlof::application::{AppError, EntitlementFilter};
use verlof::domain::{MAX_HOURS, MIN_HOURS, RemainderStatus, ValidationError};

#[tokio::test]
async fn test_create_and_list_entitlements() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let staff = Staff::create(&service).await?;

    service.create_entitlement(&staff.admin, "alice", 2019, 200).await?;
    service.create_entitlement(&staff.admin, "alice", 2018, 180).await?;
    service.create_entitlement(&staff.admin, "bob", 2019, 160).await?;

    let entitlements = service.list_entitlements(&staff.alice).await?;
    assert_eq!(entitlements.len(), 2);

    // Oldest year first
    assert_eq!(entitlements[0].entitlement.year, 2018);
    assert_eq!(entitlements[0].entitlement.leave_hours, 180);
    assert_eq!(entitlements[1].entitlement.year, 2019);
    assert_eq!(entitlements[1].used_hours, 0);
    assert_eq!(entitlements[1].remainder_hours, 200);

    let bobs = service.list_entitlements(&staff.bob).await?;
    assert_eq!(bobs.len(), 1);
    assert_eq!(bobs[0].entitlement.leave_hours, 160);

    Ok(())
}

#[tokio::test]
async fn test_duplicate_year_rejected() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let staff = Staff::create(&service).await?;

    service.create_entitlement(&staff.admin, "alice", 2019, 200).await?;
    let result = service.create_entitlement(&staff.admin, "alice", 2019, 100).await;

    assert!(matches!(
        result,
        Err(AppError::Validation(ValidationError::DuplicateYear { year: 2019 }))
    ));

    // Same year for someone else is fine
    service.create_entitlement(&staff.admin, "bob", 2019, 200).await?;

    Ok(())
}

#[tokio::test]
async fn test_used_and_remainder_hours() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let staff = Staff::create(&service).await?;

    service.create_entitlement(&staff.admin, "alice", 2019, 100).await?;
    for day in ["2019-03-04", "2019-03-05", "2019-03-06"] {
        service
            .create_leave_registration(&staff.alice, leave(day, day, 8))
            .await?;
    }

    let detail = service.entitlement_detail(&staff.alice, 2019).await?;
    assert_eq!(detail.summary.used_hours, 24);
    assert_eq!(detail.summary.remainder_hours, 76);
    assert_eq!(detail.summary.status, RemainderStatus::Plenty);
    assert_eq!(detail.leave_registrations.len(), 3);

    Ok(())
}

#[tokio::test]
async fn test_negative_registrations_increase_remainder() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let staff = Staff::create(&service).await?;

    service.create_entitlement(&staff.admin, "alice", 2019, 100).await?;
    service
        .create_leave_registration(&staff.alice, leave("2019-01-02", "2019-01-02", -102))
        .await?;
    service
        .create_leave_registration(&staff.alice, leave("2019-01-03", "2019-01-03", -10))
        .await?;

    let entitlements = service.list_entitlements(&staff.alice).await?;
    assert_eq!(entitlements[0].used_hours, -112);
    assert_eq!(entitlements[0].remainder_hours, 212);

    Ok(())
}

#[tokio::test]
async fn test_status_follows_remainder() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let staff = Staff::create(&service).await?;

    service.create_entitlement(&staff.admin, "alice", 2019, 40).await?;
    service
        .create_leave_registration(&staff.alice, leave("2019-08-01", "2019-08-02", 16))
        .await?;
    let summaries = service.list_entitlements(&staff.alice).await?;
    assert_eq!(summaries[0].remainder_hours, 24);
    assert_eq!(summaries[0].status, RemainderStatus::Warning);

    service
        .create_leave_registration(&staff.alice, leave("2019-08-05", "2019-08-09", 40))
        .await?;
    let summaries = service.list_entitlements(&staff.alice).await?;
    assert_eq!(summaries[0].remainder_hours, -16);
    assert_eq!(summaries[0].status, RemainderStatus::Over);

    Ok(())
}

#[tokio::test]
async fn test_entitlement_detail() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let staff = Staff::create(&service).await?;

    service.create_entitlement(&staff.admin, "alice", 2018, 100).await?;
    service.create_entitlement(&staff.admin, "alice", 2019, 100).await?;
    service
        .create_leave_registration(&staff.alice, leave("2018-12-24", "2018-12-24", 8))
        .await?;
    service
        .create_leave_registration(&staff.alice, leave("2019-07-01", "2019-07-05", 40))
        .await?;
    service
        .create_leave_registration(&staff.alice, leave("2019-02-11", "2019-02-11", 4))
        .await?;

    let detail = service.entitlement_detail(&staff.alice, 2019).await?;
    assert_eq!(detail.summary.entitlement.year, 2019);
    assert_eq!(detail.summary.used_hours, 44);
    assert_eq!(detail.all_entitlements.len(), 2);

    // Only this year's registrations, in date order
    assert_eq!(detail.leave_registrations.len(), 2);
    assert_eq!(detail.leave_registrations[0].from_date, parse_date("2019-02-11"));
    assert_eq!(detail.leave_registrations[1].from_date, parse_date("2019-07-01"));

    Ok(())
}

#[tokio::test]
async fn test_entitlement_detail_missing_year() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let staff = Staff::create(&service).await?;

    let result = service.entitlement_detail(&staff.alice, 2019).await;
    let err = result.unwrap_err();
    assert!(err.is_not_found());
    assert!(matches!(err, AppError::EntitlementNotFound { year: 2019, .. }));

    Ok(())
}

#[tokio::test]
async fn test_update_entitlement_keeps_usage() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let staff = Staff::create(&service).await?;

    service.create_entitlement(&staff.admin, "alice", 2019, 100).await?;
    service
        .create_leave_registration(&staff.alice, leave("2019-04-01", "2019-04-01", 8))
        .await?;

    let summary = service.update_entitlement(&staff.admin, "alice", 2019, 120).await?;
    assert_eq!(summary.entitlement.leave_hours, 120);
    assert_eq!(summary.used_hours, 8);
    assert_eq!(summary.remainder_hours, 112);

    let missing = service.update_entitlement(&staff.admin, "alice", 2020, 120).await;
    assert!(matches!(missing, Err(AppError::EntitlementNotFound { .. })));

    Ok(())
}

#[tokio::test]
async fn test_delete_entitlement_cascades() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let staff = Staff::create(&service).await?;

    service.create_entitlement(&staff.admin, "alice", 2019, 100).await?;
    let registration = service
        .create_leave_registration(&staff.alice, leave("2019-04-01", "2019-04-01", 8))
        .await?;

    service.delete_entitlement(&staff.admin, "alice", 2019).await?;

    assert!(service.list_entitlements(&staff.alice).await?.is_empty());
    let gone = service
        .get_leave_registration(&staff.alice, registration.id)
        .await;
    assert!(matches!(gone, Err(AppError::LeaveRegistrationNotFound(_))));
    assert!(
        service
            .list_all_leave_registrations(&staff.admin, None)
            .await?
            .is_empty()
    );

    // The year can be allotted again afterwards
    service.create_entitlement(&staff.admin, "alice", 2019, 80).await?;

    Ok(())
}

#[tokio::test]
async fn test_default_entitlement() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let staff = Staff::create(&service).await?;

    let none = service
        .default_entitlement(&staff.alice, parse_date("2019-06-01"))
        .await?;
    assert!(none.is_none());

    service.create_entitlement(&staff.admin, "alice", 2017, 100).await?;
    service.create_entitlement(&staff.admin, "alice", 2018, 100).await?;

    // No entitlement this year: the latest one
    let latest = service
        .default_entitlement(&staff.alice, parse_date("2019-06-01"))
        .await?
        .unwrap();
    assert_eq!(latest.entitlement.year, 2018);

    service.create_entitlement(&staff.admin, "alice", 2019, 100).await?;
    let current = service
        .default_entitlement(&staff.alice, parse_date("2019-06-01"))
        .await?
        .unwrap();
    assert_eq!(current.entitlement.year, 2019);

    Ok(())
}

#[tokio::test]
async fn test_entitlement_overview_filters() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let staff = Staff::create(&service).await?;

    service.create_entitlement(&staff.admin, "alice", 2018, 100).await?;
    service.create_entitlement(&staff.admin, "alice", 2019, 100).await?;
    service.create_entitlement(&staff.admin, "bob", 2019, 150).await?;
    service
        .create_leave_registration(&staff.bob, leave("2019-10-01", "2019-10-01", 8))
        .await?;

    let all = service
        .list_all_entitlements(&staff.admin, EntitlementFilter::default())
        .await?;
    assert_eq!(all.len(), 3);

    let year_2019 = service
        .list_all_entitlements(
            &staff.admin,
            EntitlementFilter {
                year: Some(2019),
                ..Default::default()
            },
        )
        .await?;
    assert_eq!(year_2019.len(), 2);

    let bobs = service
        .list_all_entitlements(
            &staff.admin,
            EntitlementFilter {
                username: Some("bob".into()),
                year: Some(2019),
            },
        )
        .await?;
    assert_eq!(bobs.len(), 1);
    assert_eq!(bobs[0].username, "bob");
    assert_eq!(bobs[0].summary.used_hours, 8);
    assert_eq!(bobs[0].summary.remainder_hours, 142);

    Ok(())
}

#[tokio::test]
async fn test_hours_out_of_range_rejected() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let staff = Staff::create(&service).await?;

    let result = service.create_entitlement(&staff.admin, "alice", 2019, i64::MAX).await;
    assert!(matches!(
        result,
        Err(AppError::Validation(ValidationError::HoursOutOfRange { hours: i64::MAX }))
    ));
    assert!(service.list_entitlements(&staff.alice).await?.is_empty());

    service.create_entitlement(&staff.admin, "alice", 2019, 200).await?;
    let result = service.update_entitlement(&staff.admin, "alice", 2019, i64::MIN).await;
    assert!(matches!(
        result,
        Err(AppError::Validation(ValidationError::HoursOutOfRange { hours: i64::MIN }))
    ));

    let result = service
        .create_leave_registration(&staff.alice, leave("2019-01-01", "2019-01-01", i64::MIN))
        .await;
    assert!(matches!(
        result,
        Err(AppError::Validation(ValidationError::HoursOutOfRange { .. }))
    ));

    let entitlements = service.list_entitlements(&staff.alice).await?;
    assert_eq!(entitlements[0].entitlement.leave_hours, 200);
    assert_eq!(entitlements[0].used_hours, 0);

    Ok(())
}

#[tokio::test]
async fn test_remainder_at_hours_bounds() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let staff = Staff::create(&service).await?;

    service.create_entitlement(&staff.admin, "alice", 2019, MAX_HOURS).await?;
    service
        .create_leave_registration(&staff.alice, leave("2019-01-01", "2019-01-01", -1))
        .await?;

    service.create_entitlement(&staff.admin, "alice", 2020, MIN_HOURS).await?;
    for _ in 0..2 {
        service
            .create_leave_registration(&staff.alice, leave("2020-01-01", "2020-01-01", MAX_HOURS))
            .await?;
    }

    let entitlements = service.list_entitlements(&staff.alice).await?;
    assert_eq!(entitlements[0].remainder_hours, MAX_HOURS + 1);
    assert_eq!(entitlements[0].status, RemainderStatus::Plenty);
    assert_eq!(entitlements[1].used_hours, 2 * MAX_HOURS);
    assert_eq!(entitlements[1].remainder_hours, MIN_HOURS - 2 * MAX_HOURS);
    assert_eq!(entitlements[1].status, RemainderStatus::Over);

    Ok(())
}
