//! Interactive terminal driver for a Concord mediation session.
//!
//! Walks both participants through the full session: profile intake,
//! problem accounts, articulated perspectives, the clarification phase,
//! the initial ruling with its rebuttal round, and the ultimate ruling.
//! The terminal is shared; the driver tells participants when to hand the
//! keyboard over.

use anyhow::{Context, Result};
use clap::Parser;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use concord_core::stage::Stage;
use concord_core::types::{
    AnswerChoice, ClarificationAnswer, ClarificationQuestion, Party, Profile, RebuttalResponse,
};
use concord_runtime::{
    GeminiProvider, JsonFileStore, Localizer, SessionController, SessionError,
};

#[derive(Parser, Debug)]
#[command(name = "concord", about = "AI-mediated dispute resolution sessions")]
struct Args {
    /// Path of the saved profile file.
    #[arg(long, default_value = "concord-profile.json")]
    profile: PathBuf,

    /// Optional JSON locale bundle overriding the built-in English text.
    #[arg(long)]
    locale: Option<PathBuf>,

    /// Generation model override.
    #[arg(long)]
    model: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("concord=info")),
        )
        .init();

    let args = Args::parse();
    let localizer = match &args.locale {
        Some(path) => Localizer::with_bundle(path),
        None => Localizer::new(),
    };

    let mut provider = GeminiProvider::from_env()
        .context("set the GEMINI_API_KEY environment variable to run sessions")?;
    if let Some(model) = &args.model {
        provider = provider.with_model(model.clone());
    }

    let store = JsonFileStore::new(&args.profile);
    let mut controller =
        SessionController::new(provider, store).with_language(localizer.language().to_string());

    println!(
        "{} - {}\n",
        localizer.lookup("app.title", &[]),
        localizer.lookup("app.tagline", &[])
    );

    run(&mut controller, &localizer).await
}

async fn run(
    controller: &mut SessionController<GeminiProvider, JsonFileStore>,
    localizer: &Localizer,
) -> Result<()> {
    loop {
        let outcome = step(controller, localizer).await;
        match outcome {
            Ok(true) => continue,
            Ok(false) => return Ok(()),
            Err(e) => report(&e, localizer),
        }
    }
}

/// Drive one stage. Returns `false` when the participant chose to quit.
async fn step(
    controller: &mut SessionController<GeminiProvider, JsonFileStore>,
    localizer: &Localizer,
) -> Result<bool, SessionError> {
    match controller.stage() {
        Stage::LoadingProfile => {
            controller.start().await?;
            match &controller.data().profile {
                Some(profile) => println!(
                    "{}\n",
                    localizer.lookup(
                        "profile.loaded",
                        &[
                            ("nameA", profile.display_name(Party::A)),
                            ("nameB", profile.display_name(Party::B)),
                        ],
                    )
                ),
                None => println!("{}\n", localizer.lookup("profile.none", &[])),
            }
            Ok(true)
        }

        Stage::ProfileIntake => {
            let Some(profile) = intake_profile(controller.data().profile.as_ref()) else {
                return Ok(false);
            };
            controller.complete_profile(profile).await?;
            println!("{}\n", localizer.lookup("profile.saved", &[]));
            Ok(true)
        }

        Stage::ProblemInputA => {
            let name = controller.data().display_name(Party::A).to_string();
            println!("{}", localizer.lookup("problem.prompt_a", &[("nameA", &name)]));
            println!("(or type :edit to change the profile, :reset to clear it, :quit to exit)");
            let Some(line) = read_line("> ") else {
                return Ok(false);
            };
            match line.trim() {
                ":quit" => return Ok(false),
                ":edit" => {
                    controller.edit_profile();
                    return Ok(true);
                }
                ":reset" => {
                    controller.reset_profile().await?;
                    println!("{}\n", localizer.lookup("profile.cleared", &[]));
                    return Ok(true);
                }
                _ => {}
            }
            println!("{}", localizer.lookup("perspective.working", &[]));
            controller.submit_problem_a(&line).await?;
            Ok(true)
        }

        Stage::PerspectiveA => {
            let perspective = controller.data().perspective_a.clone();
            if let Some(p) = perspective {
                print_block(&p.title, &p.text);
            }
            if !pause("Press Enter to continue to the other party's account.") {
                return Ok(false);
            }
            controller.proceed_to_problem_b().await?;
            Ok(true)
        }

        Stage::ProblemInputB => {
            let name = controller.data().display_name(Party::B).to_string();
            println!("{}", localizer.lookup("problem.prompt_b", &[("nameB", &name)]));
            let Some(line) = read_line("> ") else {
                return Ok(false);
            };
            println!("{}", localizer.lookup("perspective.working", &[]));
            controller.submit_problem_b(&line).await?;
            Ok(true)
        }

        Stage::PerspectiveB => {
            let perspective = controller.data().perspective_b.clone();
            if let Some(p) = perspective {
                print_block(&p.title, &p.text);
            }
            if !pause("Press Enter to begin the clarification phase.") {
                return Ok(false);
            }
            println!("{}", localizer.lookup("clarify.working", &[]));
            controller.request_clarifications().await?;
            Ok(true)
        }

        Stage::ClarificationIntakeA => clarification_round(controller, localizer, Party::A).await,
        Stage::ClarificationIntakeB => clarification_round(controller, localizer, Party::B).await,

        Stage::InitialRulingDisplay => {
            print_initial_ruling(controller, localizer);
            let name = controller.data().display_name(Party::A).to_string();
            let Some(agree) = ask_agreement(
                &localizer.lookup("ruling.feedback_prompt", &[("name", &name)]),
            ) else {
                return Ok(false);
            };
            controller.respond_to_initial_ruling(Party::A, agree)?;
            Ok(true)
        }

        Stage::InitialRulingFeedbackB => {
            let name = controller.data().display_name(Party::B).to_string();
            let Some(agree) = ask_agreement(
                &localizer.lookup("ruling.feedback_prompt", &[("name", &name)]),
            ) else {
                return Ok(false);
            };
            controller.respond_to_initial_ruling(Party::B, agree)?;
            Ok(true)
        }

        Stage::RebuttalInputActive => {
            let active = controller
                .data()
                .rebuttal
                .active_party
                .unwrap_or(Party::A);
            let name = controller.data().display_name(active).to_string();
            println!("{}", localizer.lookup("rebuttal.prompt", &[("name", &name)]));
            let Some(line) = read_line("> ") else {
                return Ok(false);
            };
            controller.submit_rebuttal(&line).await?;
            Ok(true)
        }

        Stage::PresentRebuttalToOther => {
            let data = controller.data();
            let active = data.rebuttal.active_party.unwrap_or(Party::A);
            let active_name = data.display_name(active).to_string();
            let other_name = data.display_name(active.other()).to_string();
            println!(
                "\n{}",
                localizer.lookup("rebuttal.present", &[("name", &active_name)])
            );
            match &data.rebuttal.active_summary {
                Some(summary) => println!("  {summary}\n"),
                None => println!("  {}\n", data.rebuttal.active_raw),
            }
            let Some(agree) = ask_agreement(
                &localizer.lookup("rebuttal.respond_prompt", &[("name", &other_name)]),
            ) else {
                return Ok(false);
            };
            let response = if agree {
                RebuttalResponse::Agree
            } else {
                RebuttalResponse::Disagree
            };
            println!("{}", localizer.lookup("ruling.working", &[]));
            controller.respond_to_rebuttal(response).await?;
            Ok(true)
        }

        Stage::RebuttalInputCounter => {
            let active = controller
                .data()
                .rebuttal
                .active_party
                .unwrap_or(Party::A);
            let name = controller.data().display_name(active.other()).to_string();
            println!("{}", localizer.lookup("rebuttal.counter_prompt", &[("name", &name)]));
            let Some(line) = read_line("> ") else {
                return Ok(false);
            };
            println!("{}", localizer.lookup("ruling.working", &[]));
            controller.submit_counter_rebuttal(&line).await?;
            Ok(true)
        }

        Stage::UltimateRulingDisplay => {
            print_ultimate_ruling(controller, localizer);
            let again = ask_agreement("Start a new analysis with the same profile? (agree = yes)")
                .unwrap_or(false);
            if again {
                println!("{}\n", localizer.lookup("session.new_analysis", &[]));
                controller.start_new_analysis()?;
                Ok(true)
            } else {
                Ok(false)
            }
        }
    }
}

async fn clarification_round(
    controller: &mut SessionController<GeminiProvider, JsonFileStore>,
    localizer: &Localizer,
    party: Party,
) -> Result<bool, SessionError> {
    let data = controller.data();
    let prompts = data
        .clarifications
        .clone()
        .ok_or(SessionError::MissingContext("clarification prompts"))?;
    let name = data.display_name(party).to_string();
    let other = data.display_name(party.other()).to_string();

    if party == Party::A {
        print_block(&localizer.lookup("clarify.intro_heading", &[]), &prompts.intro);
    }
    println!(
        "\n{}",
        localizer.lookup("clarify.for_party", &[("name", &name)])
    );

    // A closed stdin answers the remaining questions as skipped; skipping
    // is a valid answer and the session stays consistent.
    let mut answers = Vec::new();
    for question in prompts.questions_for(party) {
        let answer = ask_question(question, localizer)
            .unwrap_or_else(|| ClarificationAnswer::skipped(question));
        answers.push(answer);
    }

    controller.submit_clarification_answers(party, answers).await?;

    match party {
        Party::A => println!(
            "\n{}\n",
            localizer.lookup("clarify.handoff", &[("name", &name), ("other", &other)])
        ),
        Party::B => {
            println!("\n{}", prompts.outro);
            println!("{}", localizer.lookup("ruling.working", &[]));
        }
    }
    Ok(true)
}

/// `None` when stdin closes mid-question; the round skips the rest.
fn ask_question(
    question: &ClarificationQuestion,
    localizer: &Localizer,
) -> Option<ClarificationAnswer> {
    println!("\n{}", question.question_text);
    println!("  A. {}", question.suggestions.a);
    println!("  B. {}", question.suggestions.b);
    println!("  C. {}", question.suggestions.c);
    println!("{}", localizer.lookup("clarify.answer_prompt", &[]));
    loop {
        let line = read_line("> ")?;
        match line.trim().to_ascii_uppercase().as_str() {
            "A" => return Some(ClarificationAnswer::chosen(question, AnswerChoice::A)),
            "B" => return Some(ClarificationAnswer::chosen(question, AnswerChoice::B)),
            "C" => return Some(ClarificationAnswer::chosen(question, AnswerChoice::C)),
            "D" => {
                println!("{}", localizer.lookup("clarify.own_words", &[]));
                let text = read_line("> ")?;
                return Some(ClarificationAnswer::custom(question, text.trim()));
            }
            "S" => return Some(ClarificationAnswer::skipped(question)),
            _ => println!("{}", localizer.lookup("clarify.answer_prompt", &[])),
        }
    }
}

fn print_initial_ruling(
    controller: &SessionController<GeminiProvider, JsonFileStore>,
    localizer: &Localizer,
) {
    let data = controller.data();
    println!("\n=== {} ===", localizer.lookup("ruling.initial_heading", &[]));
    match &data.initial_ruling {
        Some(sections) if !sections.fallback => {
            print_block(
                &localizer.lookup("ruling.summary_heading", &[]),
                &sections.summary,
            );
            print_block(
                &localizer.lookup("ruling.analysis_heading", &[]),
                &sections.analysis,
            );
            print_block(
                &localizer.lookup("ruling.recommendations_heading", &[]),
                &sections.recommendations,
            );
        }
        Some(sections) => print_block(
            &localizer.lookup("ruling.parse_fallback_heading", &[]),
            &sections.analysis,
        ),
        None => println!("{}", data.initial_ruling_raw),
    }
}

fn print_ultimate_ruling(
    controller: &SessionController<GeminiProvider, JsonFileStore>,
    localizer: &Localizer,
) {
    println!("\n=== {} ===", localizer.lookup("ultimate.heading", &[]));
    if controller.initial_ruling_accepted() {
        println!("{}\n", localizer.lookup("ultimate.accepted", &[]));
        print_initial_ruling(controller, localizer);
        return;
    }
    match &controller.data().ultimate_ruling {
        Some(sections) if !sections.fallback => {
            print_block(
                &localizer.lookup("ultimate.verdict_heading", &[]),
                &sections.verdict,
            );
            print_block(
                &localizer.lookup("ultimate.primary_heading", &[]),
                &sections.primary_suggestions,
            );
            print_block(
                &localizer.lookup("ultimate.secondary_heading", &[]),
                &sections.secondary_suggestions,
            );
            print_block(
                &localizer.lookup("ultimate.reasoning_heading", &[]),
                &sections.reasoning,
            );
        }
        Some(sections) => print_block(
            &localizer.lookup("ruling.parse_fallback_heading", &[]),
            &sections.reasoning,
        ),
        None => println!("{}", controller.data().ultimate_ruling_raw),
    }
}

/// Prompt for every profile field. Enter keeps the shown current value
/// when re-editing; only the two names are required. `None` when stdin
/// closes mid-intake.
fn intake_profile(current: Option<&Profile>) -> Option<Profile> {
    let mut profile = current.cloned().unwrap_or_default();
    println!("Profile intake. Press Enter to keep a value shown in [brackets].");

    for party in [Party::A, Party::B] {
        println!("\n--- {} ---", party.generic_name());
        let record = match party {
            Party::A => &mut profile.party_a,
            Party::B => &mut profile.party_b,
        };
        field("Name", &mut record.name)?;
        field("Gender", &mut record.gender)?;
        field("Age", &mut record.age)?;
        field("Country", &mut record.country)?;
        field("City", &mut record.city)?;
        field("Religion/Beliefs", &mut record.beliefs)?;
        field("Occupation", &mut record.occupation)?;
        field("Work hours", &mut record.work_load)?;
        field("Stress level", &mut record.stress_level)?;
        field("Financial situation", &mut record.financial_situation)?;
    }

    println!("\n--- Relationship ---");
    field("Relationship duration", &mut profile.relationship.duration)?;
    field(
        "Key recurring issues",
        &mut profile.relationship.recurring_issues,
    )?;
    let children = read_line(&format!(
        "Children? (yes/no) [{}]> ",
        if profile.relationship.has_children {
            "yes"
        } else {
            "no"
        }
    ))?;
    match children.trim().to_ascii_lowercase().as_str() {
        "yes" | "y" => profile.relationship.has_children = true,
        "no" | "n" => profile.relationship.has_children = false,
        _ => {}
    }
    if profile.relationship.has_children {
        field("Children details", &mut profile.relationship.children_details)?;
    } else {
        profile.relationship.children_details.clear();
    }
    Some(profile)
}

fn field(label: &str, value: &mut String) -> Option<()> {
    let line = read_line(&format!("{label} [{value}]> "))?;
    let trimmed = line.trim();
    if !trimmed.is_empty() {
        *value = trimmed.to_string();
    }
    Some(())
}

fn ask_agreement(prompt: &str) -> Option<bool> {
    loop {
        let line = read_line(&format!("{prompt}\n> "))?;
        match line.trim().to_ascii_lowercase().as_str() {
            "agree" | "yes" | "y" => return Some(true),
            "disagree" | "no" | "n" => return Some(false),
            _ => println!("Please answer 'agree' or 'disagree'."),
        }
    }
}

fn report(error: &SessionError, localizer: &Localizer) {
    let message = match error {
        SessionError::Provider(e) if e.is_auth() => localizer.lookup("error.auth", &[]),
        SessionError::Provider(_) => localizer.lookup("error.collaborator", &[]),
        SessionError::Busy => localizer.lookup("error.busy", &[]),
        other => localizer.lookup("error.generic", &[("detail", &other.to_string())]),
    };
    eprintln!("\n{message}\n");
}

fn print_block(title: &str, body: &str) {
    println!("\n## {title}\n{body}");
}

/// `false` when stdin closed instead of continuing.
fn pause(message: &str) -> bool {
    read_line(&format!("{message}\n")).is_some()
}

/// Prompt and read one line. `None` means stdin is closed; callers treat
/// it as quit (or skip, for a clarification question).
fn read_line(prompt: &str) -> Option<String> {
    print!("{prompt}");
    let _ = io::stdout().flush();
    read_trimmed(&mut io::stdin().lock())
}

fn read_trimmed(reader: &mut impl BufRead) -> Option<String> {
    let mut line = String::new();
    match reader.read_line(&mut line) {
        Ok(0) | Err(_) => None,
        Ok(_) => Some(line.trim_end_matches(['\r', '\n']).to_string()),
    }
}
