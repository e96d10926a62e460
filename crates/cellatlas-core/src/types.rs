//! Core types for conversation turns
//!
//! Defines the structured input the resolver works from:
//! - Classified intents (`general.sub`)
//! - Extracted parameters
//! - Ordered feature sets

use indexmap::IndexSet;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Leading segment of a classified intent
///
/// Selects the resolver branch or the no-API handler branch.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum GeneralIntent {
    /// Average measurement heatmap
    Average,
    /// Fraction detected bubble heatmap
    FractionDetected,
    /// Top markers of a cell type
    Markers,
    /// Highest measuring cell types for one feature
    HighestMeasurement,
    /// Features similar to a queried one
    SimilarFeatures,
    /// Add features to the current plot
    Add,
    /// Remove features from the current plot
    Remove,
    /// Cell type x organ detection table
    CelltypeXOrgan,
    /// Organism listing
    Organisms,
    /// Feature sequences
    Sequences,
    /// Export the current plot
    Download,
    /// Re-display the current plot
    Plot,
    /// Greeting or farewell
    Greetings,
    /// Reference link
    Link,
    /// Anything the classifier produced that we do not know
    Unknown(String),
}

impl GeneralIntent {
    /// Parse the leading intent segment
    #[must_use]
    pub fn from_segment(segment: &str) -> Self {
        match segment {
            "average" => Self::Average,
            "fraction_detected" => Self::FractionDetected,
            "markers" => Self::Markers,
            "highest_measurement" => Self::HighestMeasurement,
            "similar_features" => Self::SimilarFeatures,
            "add" => Self::Add,
            "remove" => Self::Remove,
            "celltypexorgan" => Self::CelltypeXOrgan,
            "organisms" => Self::Organisms,
            "sequences" => Self::Sequences,
            "download" => Self::Download,
            "plot" => Self::Plot,
            "greetings" => Self::Greetings,
            "link" => Self::Link,
            other => Self::Unknown(other.to_string()),
        }
    }

    /// Segment name as the classifier spells it
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Average => "average",
            Self::FractionDetected => "fraction_detected",
            Self::Markers => "markers",
            Self::HighestMeasurement => "highest_measurement",
            Self::SimilarFeatures => "similar_features",
            Self::Add => "add",
            Self::Remove => "remove",
            Self::CelltypeXOrgan => "celltypexorgan",
            Self::Organisms => "organisms",
            Self::Sequences => "sequences",
            Self::Download => "download",
            Self::Plot => "plot",
            Self::Greetings => "greetings",
            Self::Link => "link",
            Self::Unknown(s) => s,
        }
    }

    /// Intents answered without touching the measurement service
    #[inline]
    #[must_use]
    pub fn is_no_api(&self) -> bool {
        matches!(
            self,
            Self::Download | Self::Plot | Self::Greetings | Self::Link
        )
    }

    /// Intents that edit the feature set of the current plot
    #[inline]
    #[must_use]
    pub fn is_incremental(&self) -> bool {
        matches!(self, Self::Add | Self::Remove)
    }
}

impl fmt::Display for GeneralIntent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classified user request in `general.sub` form
///
/// Parsing never fails: an unknown leading segment becomes
/// [`GeneralIntent::Unknown`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct Intent {
    raw: String,
    general: GeneralIntent,
    sub: String,
}

impl Intent {
    /// Parse a dotted intent string
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        let (general, sub) = match raw.split_once('.') {
            Some((general, sub)) => (general, sub),
            None => (raw, ""),
        };
        Self {
            raw: raw.to_string(),
            general: GeneralIntent::from_segment(general),
            sub: sub.to_string(),
        }
    }

    /// Leading segment
    #[inline]
    #[must_use]
    pub fn general(&self) -> &GeneralIntent {
        &self.general
    }

    /// Everything after the first dot (may be empty)
    #[inline]
    #[must_use]
    pub fn sub(&self) -> &str {
        &self.sub
    }

    /// Full dotted string
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl From<String> for Intent {
    fn from(raw: String) -> Self {
        Self::parse(&raw)
    }
}

impl From<&str> for Intent {
    fn from(raw: &str) -> Self {
        Self::parse(raw)
    }
}

impl From<Intent> for String {
    fn from(intent: Intent) -> Self {
        intent.raw
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Ordered set of feature identifiers
///
/// Keeps first-seen order and collapses duplicates. Crosses the API and JSON
/// boundary as a comma-joined string.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeatureSet(IndexSet<String>);

impl FeatureSet {
    /// Create empty set
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a comma-joined list, trimming entries and dropping empties
    #[must_use]
    pub fn parse(joined: &str) -> Self {
        joined.split(',').collect()
    }

    /// Prior features followed by the new ones not already present
    #[must_use]
    pub fn union(&self, other: &Self) -> Self {
        let mut merged = self.0.clone();
        merged.extend(other.0.iter().cloned());
        Self(merged)
    }

    /// Features not named in `other`, survivors keep their order
    #[must_use]
    pub fn difference(&self, other: &Self) -> Self {
        Self(
            self.0
                .iter()
                .filter(|f| !other.0.contains(*f))
                .cloned()
                .collect(),
        )
    }

    /// Membership test (exact string match)
    #[inline]
    #[must_use]
    pub fn contains(&self, feature: &str) -> bool {
        self.0.contains(feature)
    }

    /// Number of features
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the set is empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// First feature in order
    #[inline]
    #[must_use]
    pub fn first(&self) -> Option<&str> {
        self.0.first().map(String::as_str)
    }

    /// Iterate in order
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// Features as an ordered vector (plot axis form)
    #[must_use]
    pub fn to_vec(&self) -> Vec<String> {
        self.0.iter().cloned().collect()
    }

    /// Comma-joined wire form
    #[must_use]
    pub fn joined(&self) -> String {
        self.to_vec().join(",")
    }
}

impl<S: AsRef<str>> FromIterator<S> for FeatureSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|s| s.as_ref().trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
        )
    }
}

impl fmt::Display for FeatureSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.joined())
    }
}

impl Serialize for FeatureSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.joined())
    }
}

impl<'de> Deserialize<'de> for FeatureSet {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Input {
            Joined(String),
            List(Vec<String>),
        }

        Ok(match Input::deserialize(deserializer)? {
            Input::Joined(joined) => Self::parse(&joined),
            Input::List(list) => list.into_iter().collect(),
        })
    }
}

/// Parameters extracted from the user's utterance
///
/// Single-feature intents send `feature` rather than `features`; both land in
/// [`Params::features`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Params {
    /// Organism identifier, e.g. `h_sapiens`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organism: Option<String>,
    /// Organ identifier, e.g. `lung`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organ: Option<String>,
    /// Target cell type
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub celltype: Option<String>,
    /// Named features
    #[serde(default, alias = "feature", skip_serializing_if = "Option::is_none")]
    pub features: Option<FeatureSet>,
    /// Top-N override
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub number: Option<usize>,
}

impl Params {
    /// Create empty params
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With organism
    #[inline]
    #[must_use]
    pub fn with_organism(mut self, organism: impl Into<String>) -> Self {
        self.organism = Some(organism.into());
        self
    }

    /// With organ
    #[inline]
    #[must_use]
    pub fn with_organ(mut self, organ: impl Into<String>) -> Self {
        self.organ = Some(organ.into());
        self
    }

    /// With cell type
    #[inline]
    #[must_use]
    pub fn with_celltype(mut self, celltype: impl Into<String>) -> Self {
        self.celltype = Some(celltype.into());
        self
    }

    /// With features from a comma-joined list
    #[inline]
    #[must_use]
    pub fn with_features(mut self, joined: &str) -> Self {
        self.features = Some(FeatureSet::parse(joined));
        self
    }

    /// With top-N override
    #[inline]
    #[must_use]
    pub fn with_number(mut self, number: usize) -> Self {
        self.number = Some(number);
        self
    }
}

/// One classified turn as handed over by the classifier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolveRequest {
    /// Classified intent
    pub intent: Intent,
    /// Extracted parameters
    #[serde(default)]
    pub params: Params,
    /// Similarity-ranked features some classifiers attach to `similar_features`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub similar_features: Option<Vec<String>>,
}

impl ResolveRequest {
    /// Create request
    #[inline]
    #[must_use]
    pub fn new(intent: impl Into<Intent>, params: Params) -> Self {
        Self {
            intent: intent.into(),
            params,
            similar_features: None,
        }
    }

    /// With a precomputed similarity ranking
    #[inline]
    #[must_use]
    pub fn with_similar_features(mut self, ranked: Vec<String>) -> Self {
        self.similar_features = Some(ranked);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn intent_parse_splits_segments() {
        let intent = Intent::parse("add.gene");
        assert_eq!(intent.general(), &GeneralIntent::Add);
        assert_eq!(intent.sub(), "gene");
        assert_eq!(intent.as_str(), "add.gene");
    }

    #[test]
    fn intent_parse_keeps_multi_dot_sub() {
        let intent = Intent::parse("greetings.bye.now");
        assert_eq!(intent.general(), &GeneralIntent::Greetings);
        assert_eq!(intent.sub(), "bye.now");
    }

    #[test]
    fn intent_parse_unknown() {
        let intent = Intent::parse("foo.bar");
        assert_eq!(intent.general(), &GeneralIntent::Unknown("foo".to_string()));
        assert!(!intent.general().is_no_api());
    }

    #[test]
    fn only_add_and_remove_are_incremental() {
        assert!(Intent::parse("add.gene").general().is_incremental());
        assert!(Intent::parse("remove.gene").general().is_incremental());
        assert!(!Intent::parse("average.geneExpression").general().is_incremental());
        assert!(!Intent::parse("download").general().is_incremental());
    }

    #[test]
    fn intent_without_sub() {
        let intent = Intent::parse("organisms");
        assert_eq!(intent.general(), &GeneralIntent::Organisms);
        assert_eq!(intent.sub(), "");
    }

    #[test]
    fn feature_set_parse_trims_and_dedups() {
        let set = FeatureSet::parse(" GeneA, GeneB,,GeneA ,GeneC");
        assert_eq!(set.to_vec(), vec!["GeneA", "GeneB", "GeneC"]);
        assert_eq!(set.joined(), "GeneA,GeneB,GeneC");
    }

    #[test]
    fn feature_set_union_appends_new() {
        let prior = FeatureSet::parse("GeneA,GeneB");
        let delta = FeatureSet::parse("GeneB,GeneC");
        assert_eq!(prior.union(&delta).joined(), "GeneA,GeneB,GeneC");
    }

    #[test]
    fn feature_set_difference_exact_match() {
        let prior = FeatureSet::parse("GeneA,GeneB,GeneC");
        let delta = FeatureSet::parse("GeneB,geneC");
        assert_eq!(prior.difference(&delta).joined(), "GeneA,GeneC");
    }

    #[test]
    fn params_accept_feature_alias() {
        let params: Params =
            serde_json::from_str(r#"{"organism":"m_musculus","feature":"Actb"}"#).unwrap();
        assert_eq!(params.features, Some(FeatureSet::parse("Actb")));

        let params: Params = serde_json::from_str(r#"{"features":"Actb,Gapdh"}"#).unwrap();
        assert_eq!(params.features.unwrap().len(), 2);
    }

    #[test]
    fn feature_set_json_roundtrip_is_joined() {
        let set = FeatureSet::parse("GeneA,GeneB");
        assert_eq!(serde_json::to_string(&set).unwrap(), r#""GeneA,GeneB""#);
        let list: FeatureSet = serde_json::from_str(r#"["GeneA","GeneB"]"#).unwrap();
        assert_eq!(list, set);
    }

    #[test]
    fn request_deserializes_from_classifier_json() {
        let request: ResolveRequest = serde_json::from_str(
            r#"{"intent":"similar_features.geneExpression","params":{"feature":"CD19"},"similar_features":["CD79A","MS4A1"]}"#,
        )
        .unwrap();
        assert_eq!(request.intent.general(), &GeneralIntent::SimilarFeatures);
        assert_eq!(request.similar_features.unwrap().len(), 2);
    }

    fn gene_list() -> impl Strategy<Value = Vec<String>> {
        prop::collection::vec("[A-E][0-3]", 0..12)
    }

    proptest! {
        #[test]
        fn union_is_prior_then_unseen_additions(prior in gene_list(), added in gene_list()) {
            let f = FeatureSet::from_iter(&prior);
            let a = FeatureSet::from_iter(&added);
            let merged = f.union(&a);

            let mut expected = f.to_vec();
            for gene in a.iter() {
                if !expected.iter().any(|g| g == gene) {
                    expected.push(gene.to_string());
                }
            }
            prop_assert_eq!(merged.to_vec(), expected);
        }

        #[test]
        fn difference_keeps_survivor_order(prior in gene_list(), removed in gene_list()) {
            let f = FeatureSet::from_iter(&prior);
            let r = FeatureSet::from_iter(&removed);
            let kept = f.difference(&r);

            let expected: Vec<String> = f.iter().filter(|g| !r.contains(g)).map(str::to_string).collect();
            prop_assert_eq!(kept.to_vec(), expected);
            prop_assert!(kept.iter().all(|g| !r.contains(g)));
        }
    }
}
