use std::fmt;

use anyhow::Result;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::config::{ClassifierConfig, KeywordFamily};
use crate::keywords::KeywordSet;
use crate::model::BusinessDetails;

/// Insurance class codes for the supported business types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ClassCode {
    #[serde(rename = "16910")]
    FullServiceRestaurant,
    #[serde(rename = "16911")]
    BarTavern,
    #[serde(rename = "16912")]
    Nightclub,
    #[serde(rename = "16920")]
    FastFood,
}

impl ClassCode {
    pub fn code(self) -> &'static str {
        match self {
            Self::FullServiceRestaurant => "16910",
            Self::BarTavern => "16911",
            Self::Nightclub => "16912",
            Self::FastFood => "16920",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Self::FullServiceRestaurant => "Full-service Restaurant",
            Self::BarTavern => "Bar/Tavern",
            Self::Nightclub => "Nightclub",
            Self::FastFood => "Fast Food Restaurant",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code.trim() {
            "16910" => Some(Self::FullServiceRestaurant),
            "16911" => Some(Self::BarTavern),
            "16912" => Some(Self::Nightclub),
            "16920" => Some(Self::FastFood),
            _ => None,
        }
    }
}

impl Default for ClassCode {
    fn default() -> Self {
        Self::FullServiceRestaurant
    }
}

impl fmt::Display for ClassCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Business-type templates, in tie-break priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BusinessType {
    Nightclub,
    Bar,
    FastFood,
    Restaurant,
}

impl BusinessType {
    /// Earlier entries win ties.
    pub const PRIORITY: [BusinessType; 4] = [
        BusinessType::Nightclub,
        BusinessType::Bar,
        BusinessType::FastFood,
        BusinessType::Restaurant,
    ];

    pub fn class_code(self) -> ClassCode {
        match self {
            Self::Nightclub => ClassCode::Nightclub,
            Self::Bar => ClassCode::BarTavern,
            Self::FastFood => ClassCode::FastFood,
            Self::Restaurant => ClassCode::FullServiceRestaurant,
        }
    }
}

/// Raw keyword hits for one family, including any price bonus.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FamilySignals {
    pub category_hits: i32,
    pub name_bonus: i32,
}

/// Composite score per business type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassScores {
    pub nightclub: i32,
    pub bar: i32,
    pub fast_food: i32,
    pub restaurant: i32,
}

impl ClassScores {
    pub fn get(&self, business_type: BusinessType) -> i32 {
        match business_type {
            BusinessType::Nightclub => self.nightclub,
            BusinessType::Bar => self.bar,
            BusinessType::FastFood => self.fast_food,
            BusinessType::Restaurant => self.restaurant,
        }
    }
}

/// Outcome of class-code selection with the evidence behind it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    pub business_type: BusinessType,
    pub class_code: ClassCode,
    /// Score of the argmax winner before any threshold demotion.
    pub winning_score: i32,
    pub scores: ClassScores,
    /// Set when the argmax winner fell below its minimum score and was re-decided.
    pub demoted_from: Option<BusinessType>,
}

impl Classification {
    fn default_restaurant() -> Self {
        Self {
            business_type: BusinessType::Restaurant,
            class_code: ClassCode::FullServiceRestaurant,
            winning_score: 0,
            scores: ClassScores::default(),
            demoted_from: None,
        }
    }
}

#[derive(Debug, Clone)]
struct FamilyMatcher {
    category: KeywordSet,
    name: KeywordSet,
    weight: i32,
}

impl FamilyMatcher {
    fn new(family: &KeywordFamily) -> Result<Self> {
        Ok(Self {
            category: KeywordSet::new(&family.category_terms)?,
            name: KeywordSet::new(&family.name_terms)?,
            weight: family.weight,
        })
    }

    fn signals(&self, category_text: &str, name: &str, name_bonus: i32) -> FamilySignals {
        FamilySignals {
            category_hits: self.category.count_matches(category_text) as i32,
            name_bonus: if self.name.matches_any(name) {
                name_bonus
            } else {
                0
            },
        }
    }
}

/// Weighted keyword classifier mapping listing metadata onto a [`ClassCode`].
#[derive(Debug, Clone)]
pub struct ClassCodeClassifier {
    config: ClassifierConfig,
    nightclub: FamilyMatcher,
    bar: FamilyMatcher,
    fast_food: FamilyMatcher,
    restaurant: FamilyMatcher,
}

impl ClassCodeClassifier {
    pub fn new(config: ClassifierConfig) -> Result<Self> {
        Ok(Self {
            nightclub: FamilyMatcher::new(&config.nightclub)?,
            bar: FamilyMatcher::new(&config.bar)?,
            fast_food: FamilyMatcher::new(&config.fast_food)?,
            restaurant: FamilyMatcher::new(&config.restaurant)?,
            config,
        })
    }

    pub fn class_code(&self, business: &BusinessDetails) -> ClassCode {
        self.classify(business).class_code
    }

    #[instrument(name = "classify_business", skip_all, fields(business = %business.name))]
    pub fn classify(&self, business: &BusinessDetails) -> Classification {
        if business.categories.is_empty() {
            debug!("no categories present; defaulting to full-service restaurant");
            return Classification::default_restaurant();
        }

        let scores = self.score(business);
        let mut winner = BusinessType::Restaurant;
        let mut winning_score = 0;
        for business_type in BusinessType::PRIORITY {
            let score = scores.get(business_type);
            if score > winning_score {
                winning_score = score;
                winner = business_type;
            }
        }

        let decided = match winner {
            BusinessType::Nightclub if winning_score < self.config.nightclub_min_score => {
                if scores.bar > scores.restaurant {
                    BusinessType::Bar
                } else {
                    BusinessType::Restaurant
                }
            }
            BusinessType::FastFood if winning_score < self.config.fast_food_min_score => {
                BusinessType::Restaurant
            }
            other => other,
        };

        let classification = Classification {
            business_type: decided,
            class_code: decided.class_code(),
            winning_score,
            scores,
            demoted_from: (decided != winner).then_some(winner),
        };
        debug!(
            ?scores,
            class_code = %classification.class_code,
            winning_score,
            "business classified"
        );
        classification
    }

    /// Composite scores for every business type.
    pub fn score(&self, business: &BusinessDetails) -> ClassScores {
        let category_text = business.category_text();
        let name = business.name.to_lowercase();
        let bonus = self.config.name_bonus;

        let nightclub = self.nightclub.signals(&category_text, &name, bonus);
        let bar = self.bar.signals(&category_text, &name, bonus);
        let mut fast_food = self.fast_food.signals(&category_text, &name, bonus);
        let mut restaurant = self.restaurant.signals(&category_text, &name, bonus);

        match business.price.as_deref().map(str::trim) {
            Some(price) if price == self.config.budget_price => {
                fast_food.category_hits += self.config.price_bonus;
            }
            Some(price) if price == self.config.premium_price => {
                restaurant.category_hits += self.config.price_bonus;
            }
            _ => {}
        }

        ClassScores {
            nightclub: self.nightclub.weight * nightclub.category_hits + nightclub.name_bonus,
            bar: self.bar.weight * bar.category_hits + bar.name_bonus
                - restaurant.category_hits,
            fast_food: self.fast_food.weight * fast_food.category_hits + fast_food.name_bonus,
            restaurant: self.restaurant.weight * restaurant.category_hits
                + restaurant.name_bonus,
        }
    }
}

static DEFAULT_CLASSIFIER: Lazy<ClassCodeClassifier> = Lazy::new(|| {
    ClassCodeClassifier::new(ClassifierConfig::default())
        .expect("built-in classifier lexicons compile")
});

/// Determine the class code with the built-in business-type templates.
pub fn classify_business(business: &BusinessDetails) -> ClassCode {
    DEFAULT_CLASSIFIER.class_code(business)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Category;
    use proptest::prelude::*;

    fn business(name: &str, price: Option<&str>, titles: &[&str]) -> BusinessDetails {
        BusinessDetails {
            name: name.into(),
            price: price.map(str::to_string),
            categories: titles
                .iter()
                .map(|title| Category::new(title.to_lowercase(), *title))
                .collect(),
            ..BusinessDetails::default()
        }
    }

    fn classifier() -> ClassCodeClassifier {
        ClassCodeClassifier::new(ClassifierConfig::default()).unwrap()
    }

    #[test]
    fn empty_business_defaults_to_full_service_restaurant() {
        assert_eq!(
            classify_business(&BusinessDetails::default()),
            ClassCode::FullServiceRestaurant
        );
        assert_eq!(classify_business(&business("", None, &[])).code(), "16910");
    }

    #[test]
    fn dance_club_is_a_nightclub() {
        let details = business("The Dance Club", None, &["Nightclub"]);
        let classification = classifier().classify(&details);
        assert_eq!(classification.class_code, ClassCode::Nightclub);
        assert_eq!(classification.scores.nightclub, 8);
        assert!(classification.demoted_from.is_none());
    }

    #[test]
    fn cocktail_bar_is_a_bar() {
        let details = business("Copper Tavern", Some("$$"), &["Cocktail Bars", "Beer Bar"]);
        let classification = classifier().classify(&details);
        assert_eq!(classification.class_code, ClassCode::BarTavern);
        // cocktail, bar, beer hit the alcohol family; tavern in the name
        assert_eq!(classification.scores.bar, 2 * 3 + 2);
    }

    #[test]
    fn budget_burger_joint_is_fast_food() {
        let details = business("Burger Shack", Some("$"), &["Fast Food", "Burgers"]);
        let scores = classifier().score(&details);
        // fast food + fast + price bonus, doubled, plus name bonus
        assert_eq!(scores.fast_food, 2 * (2 + 2) + 2);
        assert_eq!(scores.restaurant, 1);
        assert_eq!(classify_business(&details), ClassCode::FastFood);
    }

    #[test]
    fn premium_price_boosts_restaurant_and_penalises_bar() {
        let details = business("Maison", Some("$$$$"), &["French", "Wine Bars"]);
        let scores = classifier().score(&details);
        assert_eq!(scores.restaurant, 2);
        assert_eq!(scores.bar, 2 * 2 - 2);
    }

    #[test]
    fn weak_nightclub_signal_is_redecided() {
        // only "lounge" in the name: nightclub scores 2, below the minimum of 3
        let details = business("Blue Lounge", None, &["Italian", "Restaurants"]);
        let classification = classifier().classify(&details);
        assert_eq!(classification.scores.nightclub, 2);
        assert_eq!(classification.scores.restaurant, 1);
        assert_eq!(classification.business_type, BusinessType::Restaurant);
        assert_eq!(classification.demoted_from, Some(BusinessType::Nightclub));
    }

    #[test]
    fn weak_nightclub_signal_prefers_bar_when_bar_outscores_restaurant() {
        let mut config = ClassifierConfig::default();
        config.nightclub_min_score = 10;
        let classifier = ClassCodeClassifier::new(config).unwrap();
        let details = business("Club Pub", None, &["Nightlife"]);
        let classification = classifier.classify(&details);
        assert_eq!(classification.scores.nightclub, 5);
        assert_eq!(classification.scores.bar, 2);
        assert_eq!(classification.business_type, BusinessType::Bar);
        assert_eq!(classification.demoted_from, Some(BusinessType::Nightclub));
    }

    #[test]
    fn weak_fast_food_signal_is_demoted() {
        let mut config = ClassifierConfig::default();
        config.fast_food_min_score = 5;
        let classifier = ClassCodeClassifier::new(config).unwrap();
        let details = business("Quick Stop", None, &["Convenience Stores"]);
        let classification = classifier.classify(&details);
        assert_eq!(classification.scores.fast_food, 2);
        assert_eq!(classification.class_code, ClassCode::FullServiceRestaurant);
        assert_eq!(classification.demoted_from, Some(BusinessType::FastFood));
    }

    #[test]
    fn ties_resolve_in_priority_order() {
        let mut config = ClassifierConfig::default();
        config.bar.weight = 3;
        let classifier = ClassCodeClassifier::new(config).unwrap();
        let details = business("", None, &["Club", "Pub"]);
        let scores = classifier.score(&details);
        assert_eq!(scores.nightclub, 3);
        assert_eq!(scores.bar, 3);
        assert_eq!(classifier.classify(&details).business_type, BusinessType::Nightclub);
    }

    #[test]
    fn no_positive_scores_fall_back_to_restaurant() {
        let details = business("Corner Spot", None, &["Laundromat"]);
        let classification = classifier().classify(&details);
        assert_eq!(classification.scores, ClassScores::default());
        assert_eq!(classification.class_code, ClassCode::FullServiceRestaurant);
        assert_eq!(classification.winning_score, 0);
    }

    #[test]
    fn class_codes_serialize_as_numeric_strings() {
        assert_eq!(
            serde_json::to_string(&ClassCode::FastFood).unwrap(),
            "\"16920\""
        );
        assert_eq!(ClassCode::from_code("16911"), Some(ClassCode::BarTavern));
        assert_eq!(ClassCode::from_code("99999"), None);
        assert_eq!(ClassCode::Nightclub.to_string(), "16912");
    }

    proptest! {
        #[test]
        fn classification_is_deterministic(
            name in "[A-Za-z ]{0,24}",
            titles in proptest::collection::vec("[A-Za-z ]{1,16}", 0..4),
            price in proptest::option::of(prop::sample::select(vec!["$", "$$", "$$$", "$$$$"])),
        ) {
            let refs: Vec<&str> = titles.iter().map(String::as_str).collect();
            let details = business(&name, price, &refs);
            let first = classifier().classify(&details);
            let second = classifier().classify(&details);
            prop_assert_eq!(&first, &second);
            prop_assert_eq!(classify_business(&details), first.class_code);
        }
    }
}
