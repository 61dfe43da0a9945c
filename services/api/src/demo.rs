use crate::infra::{build_marketplace, seed_sample_units, Marketplace};
use chrono::{Duration, Local, NaiveDate};
use clap::Args;
use listing_ops::config::MarketplaceConfig;
use listing_ops::error::AppError;
use listing_ops::marketplace::{
    ActorId, ApplicationId, ApplicationStatus, AuditEntry, BulkAction, BulkOperation, LeaseState,
    Listing, ListingDraft, ListingStatus, MaintenanceRequest, MarketplaceStore, OrgId,
    TenantApplication, UnitId,
};

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Override the reporting date (YYYY-MM-DD, defaults to today).
    #[arg(long, value_parser = crate::infra::parse_date)]
    pub(crate) today: Option<NaiveDate>,
    /// Print the full audit trail for every unit the demo touches.
    #[arg(long)]
    pub(crate) show_audit: bool,
}

/// Scripted lifecycle walkthrough against a fresh in-memory store: create,
/// suspend, maintain, restore, bulk-apply, and sweep, narrating each outcome.
pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let today = args.today.unwrap_or_else(|| Local::now().date_naive());
    let actor = ActorId("demo-operator".to_string());
    let org = OrgId("org-demo".to_string());

    let marketplace = build_marketplace(&MarketplaceConfig {
        unit_cache_ttl_secs: 300,
        price_warning_ceiling: 50_000.0,
    });
    let units = match seed_sample_units(&marketplace.store) {
        Ok(units) => units,
        Err(err) => {
            println!("demo aborted: unit seeding failed ({err})");
            return Ok(());
        }
    };

    println!("Marketplace listing lifecycle demo ({today})");
    println!("Seeded {} units across two properties.", units.len());

    demo_create_listings(&marketplace, &units, today, &actor, &org);
    demo_guard_reactions(&marketplace, &units, &actor);
    demo_maintenance_round_trip(&marketplace, &units, &actor);
    demo_bulk_batch(&marketplace, &actor, &org);
    demo_sweep(&marketplace, today, &actor);

    if args.show_audit {
        for unit_id in &units {
            if let Ok(entries) = marketplace.store.audit_for_unit(unit_id) {
                render_audit(unit_id, &entries);
            }
        }
    }

    Ok(())
}

fn demo_create_listings(
    marketplace: &Marketplace,
    units: &[UnitId],
    today: NaiveDate,
    actor: &ActorId,
    org: &OrgId,
) {
    println!("\n== Creating listings ==");

    for unit_id in units {
        let lease_state = marketplace
            .store
            .unit(unit_id)
            .ok()
            .flatten()
            .map(|unit| unit.lease_state);

        let draft = if matches!(lease_state, Some(LeaseState::Vacant))
            && unit_id.0.ends_with("riv-201")
        {
            // One future availability, so the sweep has something to activate.
            ListingDraft {
                available_on: Some(today + Duration::days(3)),
                ..ListingDraft::default()
            }
        } else {
            ListingDraft::default()
        };

        match marketplace
            .lifecycle
            .create_listing(unit_id, draft, actor, org)
        {
            Ok(listing) => render_listing("created", &listing),
            Err(err) => println!("  {unit_id}: rejected ({err})"),
        }
    }
}

fn demo_guard_reactions(marketplace: &Marketplace, units: &[UnitId], actor: &ActorId) {
    println!("\n== Guard reactions ==");

    let unit_id = &units[0];
    let application = TenantApplication {
        id: ApplicationId("app-demo-001".to_string()),
        unit_id: unit_id.clone(),
        applicant_name: "Avery Coleman".to_string(),
        applicant_email: "avery@example.com".to_string(),
        status: ApplicationStatus::Pending,
        submitted_at: chrono::Utc::now(),
    };
    if let Err(err) = marketplace.store.insert_application(application.clone()) {
        println!("  could not seed application: {err}");
        return;
    }
    println!("  seeded pending application {} for {unit_id}", application.id);

    let listing_id = match marketplace.lifecycle.listing_for_unit(unit_id) {
        Ok(listing) => listing.id,
        Err(err) => {
            println!("  no listing to suspend: {err}");
            return;
        }
    };

    match marketplace.lifecycle.update_status(
        &listing_id,
        ListingStatus::Suspended,
        actor,
        Some("owner request".to_string()),
    ) {
        Ok(listing) => render_listing("suspended", &listing),
        Err(err) => println!("  suspension failed: {err}"),
    }

    for notice in marketplace.notices.events() {
        println!(
            "  notice '{}' queued for {} (unit {})",
            notice.template, notice.recipient, notice.unit_id
        );
    }

    match marketplace.lifecycle.update_status(
        &listing_id,
        ListingStatus::Active,
        actor,
        None,
    ) {
        Ok(listing) => render_listing("reactivated", &listing),
        Err(err) => println!("  reactivation failed: {err}"),
    }
}

fn demo_maintenance_round_trip(marketplace: &Marketplace, units: &[UnitId], actor: &ActorId) {
    println!("\n== Maintenance round trip ==");

    let unit_id = &units[1];
    let request = MaintenanceRequest {
        unit_id: unit_id.clone(),
        note: Some("water heater replacement".to_string()),
    };

    match marketplace.lifecycle.start_maintenance(request, actor) {
        Ok(listing) => render_listing("maintenance started", &listing),
        Err(err) => {
            println!("  maintenance start failed: {err}");
            return;
        }
    }

    match marketplace.lifecycle.end_maintenance(unit_id, actor, None, None) {
        Ok(listing) => render_listing("maintenance ended", &listing),
        Err(err) => println!("  maintenance end failed: {err}"),
    }
}

fn demo_bulk_batch(marketplace: &Marketplace, actor: &ActorId, org: &OrgId) {
    println!("\n== Bulk batch (one bad unit on purpose) ==");

    let operations = vec![
        BulkOperation {
            unit_id: UnitId("unit-ash-101".to_string()),
            action: BulkAction::Suspend,
            draft: None,
        },
        BulkOperation {
            unit_id: UnitId("unit-ash-102".to_string()),
            action: BulkAction::Suspend,
            draft: None,
        },
        BulkOperation {
            unit_id: UnitId("unit-ghost-999".to_string()),
            action: BulkAction::Suspend,
            draft: None,
        },
    ];

    match marketplace.bulk.bulk_apply(operations, actor, org) {
        Ok(result) => {
            println!(
                "  batch finished: {} total, {} succeeded, {} failed",
                result.summary.total, result.summary.succeeded, result.summary.failed
            );
            for failure in &result.failed {
                println!("  - {} failed: {} ({})", failure.unit_id, failure.message, failure.code);
            }
        }
        Err(err) => println!("  batch rejected: {err}"),
    }
}

fn demo_sweep(marketplace: &Marketplace, today: NaiveDate, actor: &ActorId) {
    println!("\n== Time-based sweep (one week out) ==");

    match marketplace
        .lifecycle
        .process_time_based_transitions(today + Duration::days(7), actor)
    {
        Ok(outcome) => println!(
            "  sweep activated {} and expired {} listings",
            outcome.activated.len(),
            outcome.expired.len()
        ),
        Err(err) => println!("  sweep failed: {err}"),
    }
}

fn render_listing(event: &str, listing: &Listing) {
    println!(
        "  {event}: {} for unit {} [{}] '{}' at ${:.2}",
        listing.id, listing.unit_id, listing.status, listing.title, listing.price
    );
}

fn render_audit(unit_id: &UnitId, entries: &[AuditEntry]) {
    println!("\nAudit trail for {unit_id} ({} entries)", entries.len());
    for entry in entries {
        let transition = match (&entry.previous_status, &entry.new_status) {
            (Some(prev), Some(next)) => format!(" {prev} -> {next}"),
            (None, Some(next)) => format!(" -> {next}"),
            _ => String::new(),
        };
        println!(
            "  {} {}{} by {}",
            entry.recorded_at.format("%Y-%m-%d %H:%M:%S"),
            entry.action.label(),
            transition,
            entry.actor
        );
    }
}
