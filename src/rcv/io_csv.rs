// Primitives for reading CSV files.

use std::fs::File;

use crate::rcv::{
    io_common::{assemble_choices, simplify_file_name},
    *,
};

pub fn read_csv_ranking(path: String, cfs: &FileSource) -> RcvResult<Vec<ParsedBallot>> {
    let default_id = make_default_id(&path);

    let id_idx_o = cfs.id_column_index_int()?;
    let choices_start_col = cfs.first_vote_column_index()?;

    let mut res: Vec<ParsedBallot> = Vec::new();
    let (records, row_offset) = get_records(&path, cfs)?;

    for (idx, line_r) in records.enumerate() {
        let lineno = idx + row_offset + 1;
        debug!("{:?} {:?}", lineno, line_r);
        let line = line_r.context(CsvLineParseSnafu {})?;
        let id = if let Some(id_idx) = id_idx_o {
            line.get(id_idx)
                .context(CsvLineTooShortSnafu { lineno })?
                .to_string()
        } else {
            default_id(lineno)
        };
        ensure!(
            line.len() >= choices_start_col,
            CsvLineTooShortSnafu { lineno }
        );

        let cells: Vec<String> = line
            .iter()
            .skip(choices_start_col)
            .map(|s| s.to_string())
            .collect();
        let choices = assemble_choices(&cells);
        debug!(
            "read_csv_ranking: lineno: {:?} choices: {:?}",
            lineno, &choices
        );

        res.push(ParsedBallot { id, choices });
    }
    Ok(res)
}

fn get_records(
    path: &String,
    cfs: &FileSource,
) -> RcvResult<(csv::StringRecordsIntoIter<File>, usize)> {
    let first_row = cfs.first_vote_row_index()?;
    let rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)
        .context(CsvOpenSnafu { path: path.clone() })?;
    let mut records = rdr.into_records();
    for _ in 0..first_row {
        _ = records.next();
    }
    Ok((records, first_row))
}

fn make_default_id(path: &String) -> impl Fn(usize) -> String {
    let simplified_file_name = simplify_file_name(path.as_str());
    move |lineno| format!("{}-{:08}", simplified_file_name, lineno)
}
