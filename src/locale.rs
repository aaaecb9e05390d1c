use crate::report::{Band, Metric};

/// Output language for the report's static text. Analysis content is rendered as given.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Locale {
    #[default]
    En,
    Es,
    Fr,
    De,
}

impl Locale {
    /// Resolves a BCP-47-ish tag such as `es-MX` or `de_DE`. Unknown tags fall back to English.
    pub fn from_tag(tag: &str) -> Self {
        let primary = tag
            .trim()
            .split(['-', '_'])
            .next()
            .unwrap_or("")
            .to_ascii_lowercase();
        match primary.as_str() {
            "en" => Locale::En,
            "es" => Locale::Es,
            "fr" => Locale::Fr,
            "de" => Locale::De,
            _ => {
                tracing::warn!(tag, "unsupported locale tag; falling back to en");
                Locale::En
            }
        }
    }

    pub fn labels(self) -> &'static Labels {
        match self {
            Locale::En => &EN,
            Locale::Es => &ES,
            Locale::Fr => &FR,
            Locale::De => &DE,
        }
    }
}

pub struct Labels {
    pub brand: &'static str,
    pub subtitle: &'static str,
    pub summary: &'static str,
    pub breakdown: &'static str,
    pub statistics: &'static str,
    pub clauses: &'static str,
    pub issues: &'static str,
    pub suggestions: &'static str,
    pub overall_scale: [&'static str; 3],
    pub page: &'static str,
    pub of: &'static str,
    pub disclaimer: &'static str,
    pub copyright: &'static str,
    pub untitled: &'static str,
    metrics: [&'static str; 7],
    verdicts: [&'static str; 3],
    /// `{metric}` is replaced by the metric name.
    explanations: [&'static str; 3],
}

impl Labels {
    pub fn metric(&self, metric: Metric) -> &'static str {
        let index = Metric::ALL
            .iter()
            .position(|m| *m == metric)
            .unwrap_or_default();
        self.metrics[index]
    }

    pub fn verdict(&self, band: Band) -> &'static str {
        self.verdicts[band_index(band)]
    }

    pub fn explanation(&self, metric: Metric, band: Band) -> String {
        self.explanations[band_index(band)].replace("{metric}", self.metric(metric))
    }

    pub fn page_label(&self, page: usize, total: usize) -> String {
        format!("{} {} {} {}", self.page, page, self.of, total)
    }
}

fn band_index(band: Band) -> usize {
    match band {
        Band::Favorable => 0,
        Band::Caution => 1,
        Band::Unfavorable => 2,
    }
}

static EN: Labels = Labels {
    brand: "SignSense",
    subtitle: "Contract Analysis Report",
    summary: "Summary",
    breakdown: "Percentage Breakdown",
    statistics: "Statistical Overview",
    clauses: "Key Clauses",
    issues: "Potential Issues",
    suggestions: "Suggestions",
    overall_scale: ["Unfavorable", "Caution", "Favorable"],
    page: "Page",
    of: "of",
    disclaimer: "This report is generated automatically and is not legal advice. Consult a qualified attorney before signing.",
    copyright: "\u{a9} SignSense. All rights reserved.",
    untitled: "Untitled Contract",
    metrics: [
        "Risk",
        "Clarity",
        "Professionalism",
        "Favorability",
        "Deadline Pressure",
        "Confidence to Sign",
        "Overall Score",
    ],
    verdicts: ["Favorable", "Caution", "Unfavorable"],
    explanations: [
        "{metric} is within a comfortable range.",
        "{metric} deserves a closer look before signing.",
        "{metric} is a concern that should be addressed.",
    ],
};

static ES: Labels = Labels {
    brand: "SignSense",
    subtitle: "Informe de an\u{e1}lisis de contrato",
    summary: "Resumen",
    breakdown: "Desglose porcentual",
    statistics: "Resumen estad\u{ed}stico",
    clauses: "Cl\u{e1}usulas clave",
    issues: "Posibles problemas",
    suggestions: "Sugerencias",
    overall_scale: ["Desfavorable", "Precauci\u{f3}n", "Favorable"],
    page: "P\u{e1}gina",
    of: "de",
    disclaimer: "Este informe se genera autom\u{e1}ticamente y no constituye asesoramiento legal. Consulte a un abogado antes de firmar.",
    copyright: "\u{a9} SignSense. Todos los derechos reservados.",
    untitled: "Contrato sin t\u{ed}tulo",
    metrics: [
        "Riesgo",
        "Claridad",
        "Profesionalidad",
        "Favorabilidad",
        "Presi\u{f3}n de plazos",
        "Confianza para firmar",
        "Puntuaci\u{f3}n general",
    ],
    verdicts: ["Favorable", "Precauci\u{f3}n", "Desfavorable"],
    explanations: [
        "{metric}: dentro de un rango c\u{f3}modo.",
        "{metric}: merece una revisi\u{f3}n antes de firmar.",
        "{metric}: es un problema que debe resolverse.",
    ],
};

static FR: Labels = Labels {
    brand: "SignSense",
    subtitle: "Rapport d'analyse de contrat",
    summary: "R\u{e9}sum\u{e9}",
    breakdown: "R\u{e9}partition en pourcentage",
    statistics: "Aper\u{e7}u statistique",
    clauses: "Clauses cl\u{e9}s",
    issues: "Probl\u{e8}mes potentiels",
    suggestions: "Suggestions",
    overall_scale: ["D\u{e9}favorable", "Prudence", "Favorable"],
    page: "Page",
    of: "sur",
    disclaimer: "Ce rapport est g\u{e9}n\u{e9}r\u{e9} automatiquement et ne constitue pas un avis juridique. Consultez un avocat avant de signer.",
    copyright: "\u{a9} SignSense. Tous droits r\u{e9}serv\u{e9}s.",
    untitled: "Contrat sans titre",
    metrics: [
        "Risque",
        "Clart\u{e9}",
        "Professionnalisme",
        "Favorabilit\u{e9}",
        "Pression des d\u{e9}lais",
        "Confiance pour signer",
        "Score global",
    ],
    verdicts: ["Favorable", "Prudence", "D\u{e9}favorable"],
    explanations: [
        "{metric} : dans une plage confortable.",
        "{metric} : m\u{e9}rite un examen avant de signer.",
        "{metric} : un point \u{e0} corriger.",
    ],
};

static DE: Labels = Labels {
    brand: "SignSense",
    subtitle: "Vertragsanalyse-Bericht",
    summary: "Zusammenfassung",
    breakdown: "Prozentuale Aufschl\u{fc}sselung",
    statistics: "Statistische \u{dc}bersicht",
    clauses: "Wichtige Klauseln",
    issues: "M\u{f6}gliche Probleme",
    suggestions: "Vorschl\u{e4}ge",
    overall_scale: ["Ung\u{fc}nstig", "Vorsicht", "G\u{fc}nstig"],
    page: "Seite",
    of: "von",
    disclaimer: "Dieser Bericht wird automatisch erstellt und ist keine Rechtsberatung. Ziehen Sie vor der Unterschrift einen Anwalt hinzu.",
    copyright: "\u{a9} SignSense. Alle Rechte vorbehalten.",
    untitled: "Unbenannter Vertrag",
    metrics: [
        "Risiko",
        "Klarheit",
        "Professionalit\u{e4}t",
        "G\u{fc}nstigkeit",
        "Fristendruck",
        "Unterschriftsbereitschaft",
        "Gesamtbewertung",
    ],
    verdicts: ["G\u{fc}nstig", "Vorsicht", "Ung\u{fc}nstig"],
    explanations: [
        "{metric}: im unbedenklichen Bereich.",
        "{metric}: vor der Unterschrift genauer pr\u{fc}fen.",
        "{metric}: sollte gekl\u{e4}rt werden.",
    ],
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_resolve_by_primary_subtag() {
        assert_eq!(Locale::from_tag("es-MX"), Locale::Es);
        assert_eq!(Locale::from_tag("de_DE"), Locale::De);
        assert_eq!(Locale::from_tag(" FR "), Locale::Fr);
        assert_eq!(Locale::from_tag("pt-BR"), Locale::En);
        assert_eq!(Locale::from_tag(""), Locale::En);
    }

    #[test]
    fn explanation_interpolates_metric_name() {
        let labels = Locale::En.labels();
        assert_eq!(
            labels.explanation(Metric::Risk, Band::Unfavorable),
            "Risk is a concern that should be addressed."
        );
        assert_eq!(labels.page_label(2, 2), "Page 2 of 2");
        assert_eq!(Locale::De.labels().metric(Metric::Clarity), "Klarheit");
    }
}
