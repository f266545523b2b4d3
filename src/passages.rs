use rand::seq::SliceRandom;
use rand::Rng;

use crate::error::{QkResult, QuickKeysError};
use crate::timer_policy::Difficulty;

pub const MIN_CUSTOM_TEXT_CHARS: usize = 20;
pub const MAX_CUSTOM_TEXT_CHARS: usize = 50_000;

const EASY: &[&str] = &[
    "The quick brown fox jumps over the lazy dog.",
    "A journey of a thousand miles begins with a single step.",
    "Practice makes perfect with daily typing exercises.",
    "Simple words make reading and typing much easier.",
    "Time flies when you are having fun with games.",
    "Every expert was once a beginner at some point.",
    "Keep practicing and you will see great results.",
    "Start with short sentences and build up speed.",
    "Good habits are formed through consistent practice.",
    "Success comes to those who never give up trying.",
];

const MEDIUM: &[&str] = &[
    "Programming is the art of telling another human being what one wants the computer to do. It requires patience, practice, and persistence to master the craft.",
    "The butterfly effect suggests that small changes in initial conditions can result in large differences in a later state. This concept applies to many areas of life and science.",
    "Artificial intelligence is transforming the way we work, live, and interact with technology. Machine learning algorithms are becoming increasingly sophisticated and powerful.",
    "Climate change represents one of the most pressing challenges of our time. Sustainable development and renewable energy sources are crucial for our planet's future.",
    "The internet has revolutionized communication, commerce, and information sharing across the globe. Social media platforms now connect billions of people worldwide instantly.",
    "Education is the most powerful weapon which you can use to change the world. Knowledge and learning open doors to countless opportunities and possibilities.",
    "Innovation drives progress in every field of human endeavor. Creative thinking and problem-solving skills are essential for overcoming modern challenges.",
    "Technology advances at an exponential rate, changing how we live and work. Adaptation and continuous learning have become necessary skills for success.",
];

const HARD: &[&str] = &[
    "Quantum computing leverages quantum-mechanical phenomena such as superposition and entanglement to perform calculations exponentially faster than classical computers for specific algorithms, potentially revolutionizing cryptography, optimization, and scientific simulation.",
    "Cryptographic protocols ensure secure communication in an insecure environment by utilizing mathematical algorithms that are computationally infeasible to break without the proper keys, forming the backbone of modern digital security infrastructure.",
    "Neuroscientific research has revealed that neuroplasticity allows the brain to reorganize itself by forming new neural connections throughout life, challenging previously held beliefs about brain development and opening new avenues for treating neurological disorders.",
    "Bioengineering combines principles from engineering, biology, chemistry, and physics to develop technologies and systems that interact with biological organisms for medical and research applications, pushing the boundaries of what's possible in healthcare.",
    "Sustainable architecture incorporates environmentally conscious design principles, utilizing renewable materials, energy-efficient systems, and innovative construction techniques to minimize environmental impact while maximizing functionality and aesthetic appeal.",
    "Distributed systems architecture enables applications to run across multiple computers simultaneously, providing fault tolerance, scalability, and performance benefits while introducing complex challenges in consistency, availability, and partition tolerance.",
    "Machine learning algorithms can identify patterns in vast datasets that would be impossible for humans to detect manually, enabling applications in natural language processing, computer vision, and predictive analytics across numerous industries.",
    "Blockchain technology creates immutable, decentralized ledgers that can record transactions and data across multiple nodes without requiring a central authority, potentially disrupting traditional financial and governance systems worldwide.",
];

const RACE: &[&str] = &[
    "The five boxing wizards jump quickly into the ring with great excitement and energy as the crowd cheers loudly from the stands.",
    "Pack my box with five dozen liquor jugs for the upcoming celebration party tonight where everyone will gather together.",
    "How vexingly quick daft zebras jump when surprised by loud noises in the wild savanna during the hot summer months.",
    "The quick brown fox jumps over the lazy dog while the sun shines brightly overhead on this beautiful spring morning.",
    "Jackdaws love my big sphinx of quartz that sits proudly in the garden center among the colorful flowers and plants.",
    "Programming requires patience, practice, and persistence to master the complex algorithms and data structures effectively.",
    "Artificial intelligence is transforming technology and creating new opportunities for innovation across many industries worldwide.",
    "Climate change presents significant challenges that require immediate action and sustainable solutions for future generations.",
    "Scientists discovered that quantum computing could revolutionize cryptography and solve complex mathematical problems efficiently.",
    "Modern web development frameworks enable developers to create dynamic and responsive user interfaces with advanced functionality.",
];

pub fn passages(difficulty: Difficulty) -> &'static [&'static str] {
    match difficulty {
        Difficulty::Easy => EASY,
        Difficulty::Medium => MEDIUM,
        Difficulty::Hard => HARD,
    }
}

pub fn random_passage<R: Rng>(difficulty: Difficulty, rng: &mut R) -> &'static str {
    passages(difficulty).choose(rng).copied().unwrap_or(EASY[0])
}

pub fn random_race_text<R: Rng>(rng: &mut R) -> &'static str {
    RACE.choose(rng).copied().unwrap_or(RACE[0])
}

/// Trims and checks user-supplied practice text.
pub fn validate_custom_text(text: &str) -> QkResult<String> {
    let trimmed = text.trim();
    let len = trimmed.chars().count();
    if len == 0 {
        return Err(QuickKeysError::EmptyText);
    }
    if len < MIN_CUSTOM_TEXT_CHARS {
        return Err(QuickKeysError::TextTooShort {
            min: MIN_CUSTOM_TEXT_CHARS,
            actual: len,
        });
    }
    if len >= MAX_CUSTOM_TEXT_CHARS {
        return Err(QuickKeysError::TextTooLong {
            max: MAX_CUSTOM_TEXT_CHARS,
            actual: len,
        });
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn every_builtin_text_passes_validation() {
        for difficulty in [Difficulty::Easy, Difficulty::Medium, Difficulty::Hard] {
            for text in passages(difficulty) {
                assert!(validate_custom_text(text).is_ok(), "{text}");
            }
        }
        for text in RACE {
            assert!(validate_custom_text(text).is_ok(), "{text}");
        }
    }

    #[test]
    fn random_passage_comes_from_tier() {
        let mut rng = StdRng::seed_from_u64(42);
        let text = random_passage(Difficulty::Hard, &mut rng);
        assert!(HARD.contains(&text));
        assert!(RACE.contains(&random_race_text(&mut rng)));
    }

    #[test]
    fn custom_text_is_trimmed() {
        let text = validate_custom_text("   practice this line of text please  \n").unwrap();
        assert_eq!(text, "practice this line of text please");
    }

    #[test]
    fn custom_text_bounds() {
        assert_matches!(validate_custom_text("   "), Err(QuickKeysError::EmptyText));
        assert_matches!(
            validate_custom_text("too short"),
            Err(QuickKeysError::TextTooShort { min: 20, actual: 9 })
        );
        let long = "a".repeat(MAX_CUSTOM_TEXT_CHARS);
        assert_matches!(
            validate_custom_text(&long),
            Err(QuickKeysError::TextTooLong { .. })
        );
    }
}
