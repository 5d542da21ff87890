use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rust_xlsxwriter::*;
use uuid::Uuid;

use crate::error::Result;
use crate::models::distribution::{Distribution, DistributionStatus};
use crate::models::question::Question;
use crate::models::response::{AnswerValue, SurveyResponse};
use crate::models::template::Template;
use crate::services::analytics_service::is_complete;

pub struct ExportService;

impl ExportService {
    /// Sheet names are capped at 31 characters and may not contain `[]:*?/\`.
    fn sheet_name(title: &str) -> String {
        let cleaned: String = title
            .chars()
            .filter(|c| !matches!(c, '[' | ']' | ':' | '*' | '?' | '/' | '\\'))
            .take(31)
            .collect();
        if cleaned.trim().is_empty() {
            "Responses".to_string()
        } else {
            cleaned
        }
    }

    /// One row per response, one column per question in template order.
    fn subtitle(status: DistributionStatus, responses: usize, exported: DateTime<Utc>) -> String {
        format!(
            "Exported: {}  •  Status: {}  •  Responses: {}",
            exported.format("%d.%m.%Y %H:%M UTC"),
            status,
            responses
        )
    }

    pub fn generate_responses_xlsx(
        template: &Template,
        distribution: &Distribution,
        questions: &[Question],
        responses: &[SurveyResponse],
    ) -> Result<Vec<u8>> {
        let mut workbook = Workbook::new();
        let worksheet = workbook.add_worksheet();
        worksheet.set_name(Self::sheet_name(&template.title))?;

        // ── Color palette ──
        let primary_color = Color::RGB(0x1E293B);
        let header_bg = Color::RGB(0x0F172A);
        let header_text = Color::White;
        let alt_row_1 = Color::RGB(0xF8FAFC);
        let alt_row_2 = Color::White;
        let border_color = Color::RGB(0xE2E8F0);
        let complete_color = Color::RGB(0x10B981);
        let partial_color = Color::RGB(0xF59E0B);

        let mut columns: Vec<(String, f64)> = vec![
            ("#".to_string(), 6.0),
            ("Submitted at".to_string(), 20.0),
            ("Student".to_string(), 18.0),
            ("Complete".to_string(), 12.0),
        ];
        let fixed_columns = columns.len() as u16;
        for question in questions {
            let label = if question.required {
                format!("{} *", question.text)
            } else {
                question.text.clone()
            };
            columns.push((label, 28.0));
        }
        let last_col = (columns.len() - 1) as u16;

        for (i, (_, width)) in columns.iter().enumerate() {
            worksheet.set_column_width(i as u16, *width)?;
        }

        // ── Title row ──
        let title_format = Format::new()
            .set_font_size(16)
            .set_bold()
            .set_font_color(header_text)
            .set_background_color(primary_color)
            .set_align(FormatAlign::CenterAcross)
            .set_align(FormatAlign::VerticalCenter);

        worksheet.set_row_height(0, 40)?;
        let title = distribution.title.as_deref().unwrap_or(&template.title);
        worksheet.merge_range(0, 0, 0, last_col, title, &title_format)?;

        let subtitle_format = Format::new()
            .set_font_size(10)
            .set_italic()
            .set_font_color(Color::RGB(0x94A3B8))
            .set_background_color(primary_color)
            .set_align(FormatAlign::CenterAcross)
            .set_align(FormatAlign::VerticalCenter);

        worksheet.set_row_height(1, 22)?;
        let subtitle_text = Self::subtitle(distribution.status, responses.len(), chrono::Utc::now());
        worksheet.merge_range(1, 0, 1, last_col, &subtitle_text, &subtitle_format)?;

        // ── Header row ──
        let header_format = Format::new()
            .set_bold()
            .set_font_size(10)
            .set_font_color(header_text)
            .set_background_color(header_bg)
            .set_align(FormatAlign::Center)
            .set_align(FormatAlign::VerticalCenter)
            .set_text_wrap()
            .set_border(FormatBorder::Thin)
            .set_border_color(border_color);

        let header_row = 2;
        worksheet.set_row_height(header_row, 30)?;
        for (i, (name, _)) in columns.iter().enumerate() {
            worksheet.write_string_with_format(header_row, i as u16, name, &header_format)?;
        }

        let column_of: HashMap<Uuid, u16> = questions
            .iter()
            .enumerate()
            .map(|(idx, q)| (q.id, fixed_columns + idx as u16))
            .collect();

        // ── Data rows ──
        let data_start_row = 3;
        let mut complete_total = 0;
        for (idx, response) in responses.iter().enumerate() {
            let row = data_start_row + idx as u32;
            let bg = if idx % 2 == 0 { alt_row_1 } else { alt_row_2 };

            let base_fmt = Format::new()
                .set_font_size(10)
                .set_background_color(bg)
                .set_align(FormatAlign::VerticalCenter)
                .set_border(FormatBorder::Thin)
                .set_border_color(border_color);
            let center_fmt = base_fmt.clone().set_align(FormatAlign::Center);
            let wrap_fmt = base_fmt.clone().set_text_wrap();

            worksheet.set_row_height(row, 22)?;
            worksheet.write_number_with_format(row, 0, (idx + 1) as f64, &center_fmt)?;

            let submitted = response.submitted_at.format("%d.%m.%Y %H:%M").to_string();
            worksheet.write_string_with_format(row, 1, &submitted, &center_fmt)?;
            worksheet.write_string_with_format(
                row,
                2,
                response.student_id.as_deref().unwrap_or("anonymous"),
                &base_fmt,
            )?;

            // Blank cells keep the stripe and border.
            for col in fixed_columns..=last_col {
                worksheet.write_string_with_format(row, col, "", &wrap_fmt)?;
            }
            for answer in &response.answers {
                let (Some(&col), Some(value)) = (column_of.get(&answer.question_id), answer.parsed())
                else {
                    continue;
                };
                if let AnswerValue::Number(number) = value {
                    worksheet.write_number_with_format(row, col, number, &center_fmt)?;
                } else {
                    worksheet.write_string_with_format(row, col, value.display(), &wrap_fmt)?;
                }
            }

            let complete = is_complete(questions, response);
            if complete {
                complete_total += 1;
            }
            let flag_fmt = Format::new()
                .set_font_size(10)
                .set_bold()
                .set_font_color(Color::White)
                .set_background_color(if complete { complete_color } else { partial_color })
                .set_align(FormatAlign::Center)
                .set_align(FormatAlign::VerticalCenter)
                .set_border(FormatBorder::Thin)
                .set_border_color(border_color);
            worksheet.write_string_with_format(row, 3, if complete { "yes" } else { "no" }, &flag_fmt)?;
        }

        // ── Summary row ──
        let total_row = data_start_row + responses.len() as u32 + 1;
        let summary_fmt = Format::new()
            .set_bold()
            .set_font_size(10)
            .set_font_color(primary_color)
            .set_background_color(Color::RGB(0xE0E7FF))
            .set_align(FormatAlign::Center)
            .set_align(FormatAlign::VerticalCenter)
            .set_border(FormatBorder::Thin)
            .set_border_color(border_color);

        worksheet.set_row_height(total_row, 26)?;
        let summary = format!(
            "Total: {} responses  •  Complete: {}",
            responses.len(),
            complete_total
        );
        worksheet.merge_range(total_row, 0, total_row, last_col, &summary, &summary_fmt)?;

        worksheet.set_freeze_panes(3, 0)?;
        if !responses.is_empty() {
            worksheet.autofilter(
                header_row,
                0,
                data_start_row + responses.len() as u32 - 1,
                last_col,
            )?;
        }

        let buffer = workbook.save_to_buffer()?;
        Ok(buffer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sheet_names_are_sanitized() {
        assert_eq!(ExportService::sheet_name("Term 1: check-in?"), "Term 1 check-in");
        assert_eq!(ExportService::sheet_name("///"), "Responses");
        assert_eq!(ExportService::sheet_name(&"x".repeat(40)).len(), 31);
    }

    #[test]
    fn subtitle_uses_api_status_names() {
        let exported = DateTime::parse_from_rfc3339("2026-03-01T08:30:00Z")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(
            ExportService::subtitle(DistributionStatus::Open, 3, exported),
            "Exported: 01.03.2026 08:30 UTC  •  Status: open  •  Responses: 3"
        );
        assert!(ExportService::subtitle(DistributionStatus::Closed, 0, exported)
            .contains("Status: closed"));
    }
}
