//! Two editing sessions racing on one case study.
//!
//! Run with: `cargo run --example editor_session`

use casebook::{
    topics, CaseStudyDraft, ChangeEvent, EventBus, InMemoryRecordStore, PersistenceClient,
    RecordPatch, Section, SectionKey, WriteOutcome,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,casebook=debug")),
        )
        .init();

    let store = InMemoryRecordStore::new();
    let bus = EventBus::new();
    let desk_a = PersistenceClient::new(store.clone()).with_bus(bus.clone());
    let desk_b = PersistenceClient::new(store.clone()).with_bus(bus.clone());

    bus.subscribe(topics::RECORD_CREATED, |event: &ChangeEvent| {
        println!("bus: created {}", event.record_id());
    });
    bus.subscribe(topics::RECORD_UPDATED, |event: &ChangeEvent| {
        println!("bus: updated {}", event.record_id());
    });
    bus.subscribe(topics::RECORD_CONFLICT, |event: &ChangeEvent| {
        if let ChangeEvent::Conflict { id, report } = event {
            let verdict = if report.has_conflicts {
                "needs a decision"
            } else {
                "merged silently"
            };
            println!("bus: concurrent edit on {id} ({verdict})");
        }
    });

    // Desk A drafts the case study.
    let draft = CaseStudyDraft::new("Acme rebrand")
        .with_description("Full identity refresh for Acme Co")
        .with_section(
            SectionKey::Overview,
            Section::enabled().with_body("Acme came to us with a ten-year-old identity."),
        )
        .with_section(
            SectionKey::Problem,
            Section::enabled().with_body("Nobody could find the portfolio."),
        );

    let original = match desk_a.create(&draft).await? {
        WriteOutcome::Saved(record) => record,
        other => {
            eprintln!("create did not land: {other:?}");
            return Ok(());
        }
    };
    println!("created '{}' at revision {}", original.title, original.updated_at);

    // Both desks are now looking at the same revision.
    let base_b = desk_b.fetch(&original.id).await?;

    // Desk A rewrites the overview and saves first.
    let a_outcome = desk_a
        .update(
            &original,
            &RecordPatch::new().with_section(
                SectionKey::Overview,
                Section::enabled().with_body("Acme's identity had not moved in a decade."),
            ),
        )
        .await?;
    if let Some(record) = a_outcome.saved() {
        println!("desk A saved at revision {}", record.updated_at);
    }

    // Desk B, still on the old revision, fills in the results section.
    // Disjoint edits, so this rebases and lands without anyone choosing.
    let b_outcome = desk_b
        .update(
            &base_b,
            &RecordPatch::new().with_section(
                SectionKey::Results,
                Section::enabled().with_body("Organic traffic up 40% in the first quarter."),
            ),
        )
        .await?;
    let merged = match b_outcome {
        WriteOutcome::Saved(record) => record,
        other => {
            eprintln!("desk B's edit did not land: {other:?}");
            return Ok(());
        }
    };
    println!(
        "desk B landed on revision {} with {} sections",
        merged.updated_at,
        merged.sections.len()
    );

    // Now both desks retitle the study from the same snapshot.
    let snapshot = desk_b.fetch(&original.id).await?;
    desk_a
        .update(&snapshot, &RecordPatch::new().with_title("Acme: a decade overdue"))
        .await?;

    let contested = desk_b
        .update(&snapshot, &RecordPatch::new().with_title("Rebranding Acme"))
        .await?;
    if let WriteOutcome::Conflict { current, report } = contested {
        for conflict in &report.conflicts {
            println!(
                "conflict on {}: stored {} vs ours {}",
                conflict.field, conflict.current_value, conflict.patch_value
            );
        }
        // Desk B decides to keep its own wording.
        let resolved = report.client_wins_patch(&RecordPatch::new().with_title("Rebranding Acme"));
        let final_record = desk_b.update(&current, &resolved).await?;
        if let WriteOutcome::Saved(record) = final_record {
            println!("resolved; final record:");
            println!("{}", serde_json::to_string_pretty(&record)?);
        }
    }

    Ok(())
}
