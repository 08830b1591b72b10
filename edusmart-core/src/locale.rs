//! Fixed user-facing strings, per reply language.

use crate::models::Language;

pub fn demo_message(language: Language) -> &'static str {
    match language {
        Language::En => "I'm here to help with education store products! Currently running in demo mode. Please configure GEMINI_API_KEY for AI responses.",
        Language::Km => "ខ្ញុំនៅទីនេះដើម្បីជួយអ្នកជាមួយផលិតផលហាងអប់រំ! បច្ចុប្បន្នដំណើរការក្នុងរបៀបសាកល្បង។ សូមកំណត់ GEMINI_API_KEY សម្រាប់ការឆ្លើយតប AI។",
    }
}

pub fn apology_message(language: Language) -> &'static str {
    match language {
        Language::En => "I apologize, but I'm having trouble processing your request right now. Please try again in a moment.",
        Language::Km => "សូមអភ័យទោស ខ្ញុំមានបញ្ហាក្នុងការដំណើរការសំណើរបស់អ្នកឥឡូវនេះ។ សូមព្យាយាមម្តងទៀត។",
    }
}

pub fn no_matches_message(language: Language) -> &'static str {
    match language {
        Language::En => "No specific products found matching your query. I can help with general education store questions.",
        Language::Km => "មិនមានផលិតផលជាក់លាក់ត្រូវនឹងសំណើររបស់អ្នកទេ។ ខ្ញុំអាចជួយឆ្លើយសំណួរទូទៅអំពីហាងផ្គត់ផ្គង់អប់រំបាន។",
    }
}

/// Labels used when listing products in a context block.
pub struct ProductLabels {
    pub heading: &'static str,
    pub description: &'static str,
    pub features: &'static str,
    pub category: &'static str,
    pub age: &'static str,
    pub price: &'static str,
    pub stock: &'static str,
    pub units: &'static str,
}

pub fn product_labels(language: Language) -> ProductLabels {
    match language {
        Language::En => ProductLabels {
            heading: "Relevant Education Products:",
            description: "Description:",
            features: "Features:",
            category: "Category:",
            age: "Age:",
            price: "Price:",
            stock: "Stock:",
            units: "units",
        },
        Language::Km => ProductLabels {
            heading: "ផលិតផលអប់រំពាក់ព័ន្ធ៖",
            description: "ការពិពណ៌នា៖",
            features: "លក្ខណៈពិសេស៖",
            category: "ប្រភេទ៖",
            age: "អាយុ៖",
            price: "តម្លៃ៖",
            stock: "ស្តុក៖",
            units: "ឯកតា",
        },
    }
}

/// Store policy preamble placed before the retrieved context.
pub fn store_policy(language: Language) -> &'static str {
    match language {
        Language::En => "You are a friendly and knowledgeable assistant for \"EduSmart Store\", an education supplies retailer.
Help customers with product inquiries, recommendations, and educational advice.

STORE INFORMATION:
- We specialize in educational materials for all ages
- Products include STEM kits, books, art supplies, classroom equipment
- We offer products for teachers, parents, and students
- Price range: $5 - $500",
        Language::Km => "អ្នកគឺជាជំនួយការដែលមានចំណេះដឹង និងរួសរាយសម្រាប់ \"ហាង EduSmart\" ដែលជាហាងលក់ផលិតផលអប់រំ។
ជួយអតិថិជនជាមួយនឹងការស្វែងរកផលិតផល ការណែនាំ និងដំបូន្មានអប់រំ។

ព័ត៌មានហាង៖
- យើងឯកទេសក្នុងការផ្គត់ផ្គង់សម្ភារៈអប់រំសម្រាប់អាយុគ្រប់ប្រភេទ
- ផលិតផលរួមមានឧបករណ៍ STEM សៀវភៅ គ្រឿងសិល្បៈ ឧបករណ៍បន្ទប់រៀន
- យើងផ្តល់ផលិតផលសម្រាប់គ្រូ ឪពុកម្តាយ និងសិស្ស
- ជួរតម្លៃ៖ ៥$ - ៥០០$",
    }
}

/// Closing instruction after the retrieved context.
pub fn response_instruction(language: Language) -> &'static str {
    match language {
        Language::En => "Please respond in English and use the product information above to provide helpful responses.
Maintain natural conversation flow and be positive about learning and education.",
        Language::Km => "សូមឆ្លើយតបជាភាសាខ្មែរ និងប្រើប្រាស់ព័ត៌មានផលិតផលខាងលើដើម្បីផ្តល់ចម្លើយដែលមានប្រយោជន៍។
រក្សាការសន្ទនាធម្មជាតិ និងលើកទឹកចិត្តអំពីការរៀនសូត្រ។",
    }
}
