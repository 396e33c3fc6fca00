//! Keyword categorisation of programme names into departments.

pub const OTHER: &str = "Other";

/// Ordered so that the first matching department wins.
const DEPARTMENTS: &[(&str, &[&str])] = &[
    (
        "Health Sciences",
        &[
            "nursing", "medicine", "surgery", "clinical", "physiotherapy", "pharmacy", "dental",
            "public health", "medical", "nutrition", "biomedical", "anatomy", "physiology",
            "radiology", "midwifery",
        ],
    ),
    (
        "Engineering",
        &[
            "engineering", "civil", "mechanical", "electrical", "mechatronic", "telecom",
            "automotive", "chemical", "mining", "manufacturing", "industrial", "aerospace",
            "petroleum", "energy",
        ],
    ),
    (
        "ICT / Tech",
        &[
            "computer", "ict", "information technology", "cloud", "software", "data science",
            "ai", "cyber", "informatics", "it", "computing", "machine learning", "robotics",
            "network",
        ],
    ),
    (
        "Business",
        &[
            "commerce", "business", "accounting", "procurement", "finance", "marketing",
            "management", "entrepreneurship", "economics", "human resource", "insurance",
            "banking", "audit", "supply chain",
        ],
    ),
    ("Law & Humanities", &["law", "criminology", "justice", "legal", "forensic"]),
    (
        "Education",
        &["education", "teaching", "pedagogy", "curriculum", "teacher", "instructional"],
    ),
    (
        "Agriculture",
        &[
            "agric", "horticulture", "animal", "crop", "food science", "agribusiness", "soil",
            "dairy", "veterinary", "forestry", "fisheries", "plant", "agronomy",
        ],
    ),
    (
        "Hospitality & Tourism",
        &["tourism", "hospitality", "hotel", "leisure", "travel", "event management", "culinary"],
    ),
    (
        "Architecture & Planning",
        &[
            "architecture", "planning", "urban", "landscape", "built environment", "construction",
            "quantity survey", "interior design",
        ],
    ),
    (
        "Math & Statistics",
        &["statistics", "mathematics", "math", "actuarial", "quantitative", "statistical"],
    ),
    (
        "Pure & Applied Sciences",
        &[
            "science", "biology", "chemistry", "physics", "biochemistry", "microbiology",
            "zoology", "botany", "geology", "environmental", "ecology", "genetics", "astronomy",
        ],
    ),
    (
        "Arts & Humanities",
        &[
            "arts", "music", "fine art", "design", "drama", "theatre", "literature", "philosophy",
            "history", "language", "linguistics", "communication", "media", "film", "animation",
            "creative",
        ],
    ),
    (
        "Social Sciences",
        &[
            "social work", "sociology", "psychology", "community", "development", "anthropology",
            "counseling", "public administration", "international relations",
            "political science",
        ],
    ),
    (
        "Sports & Recreation",
        &["sports", "physical education", "recreation", "exercise", "fitness", "sport"],
    ),
    ("Aviation", &["aviation", "aeronautical", "pilot", "aircraft", "flight"]),
    ("Marine & Fisheries", &["marine", "maritime", "ocean", "aquatic", "naval"]),
    (
        "Library & Information Science",
        &["library", "records", "information science", "archival", "documentation"],
    ),
    (
        "Logistics & Transport",
        &["logistics", "transport", "shipping", "freight", "warehousing"],
    ),
    (
        "Fashion & Textile",
        &["fashion", "textile", "garment", "apparel", "clothing", "costume"],
    ),
    (
        "Media & Communication",
        &["journalism", "mass communication", "broadcast", "public relations"],
    ),
    (
        "Real Estate & Land Management",
        &["real estate", "property", "land management", "valuation"],
    ),
    ("Security & Defense", &["military", "defense", "security", "peace studies"]),
    (
        "Environmental Studies",
        &["environment", "conservation", "sustainability", "climate"],
    ),
    ("Food & Nutrition", &["food", "dietetics"]),
];

/// Keywords this short only match whole words ("it" must not match "hospitality").
const WHOLE_WORD_MAX_LEN: usize = 3;

pub fn categorize_programme(programme: &str) -> &'static str {
    let name = programme.trim().to_lowercase();
    if name.is_empty() {
        return OTHER;
    }

    let words: Vec<&str> = name
        .split(|c: char| !c.is_alphanumeric())
        .filter(|word| !word.is_empty())
        .collect();

    for &(department, keywords) in DEPARTMENTS {
        let matched = keywords.iter().any(|keyword| {
            if keyword.len() <= WHOLE_WORD_MAX_LEN {
                words.contains(keyword)
            } else {
                name.contains(keyword)
            }
        });
        if matched {
            return department;
        }
    }

    OTHER
}
