use nom::branch::alt;
use nom::character::complete::char;
use nom::character::complete::line_ending;
use nom::character::complete::multispace0;
use nom::character::complete::not_line_ending;
use nom::character::complete::space0;
use nom::character::complete::space1;
use nom::combinator::all_consuming;
use nom::combinator::eof;
use nom::combinator::opt;
use nom::combinator::verify;
use nom::multi::many0;
use nom::multi::many1;
use nom::multi::separated_list1;
use nom::number::complete::double;
use nom::sequence::delimited;
use nom::sequence::preceded;
use nom::sequence::terminated;
use nom::IResult;
use nom::Parser;

pub fn values(input: &str) -> IResult<&str, Vec<f64>> {
    delimited(space0, separated_list1(space1, double), space0).parse(input)
}

pub fn row(input: &str) -> IResult<&str, Vec<f64>> {
    terminated(values, alt((line_ending, eof))).parse(input)
}

pub fn blank_lines(input: &str) -> IResult<&str, Vec<&str>> {
    many0(preceded(space0, line_ending)).parse(input)
}

fn is_name(line: &str) -> bool {
    !line.trim().is_empty() && all_consuming(values).parse(line).is_err()
}

pub fn header(input: &str) -> IResult<&str, &str> {
    terminated(
        alt((
            preceded(char('>'), not_line_ending),
            verify(not_line_ending, is_name),
        )),
        line_ending,
    )
    .parse(input)
}

pub fn matrix(input: &str) -> IResult<&str, (Option<&str>, Vec<Vec<f64>>)> {
    let (input, _) = blank_lines(input)?;
    let (input, name) = opt(header).parse(input)?;
    let (input, rows) = many1(preceded(blank_lines, row)).parse(input)?;
    let (input, _) = multispace0(input)?;
    let name = name.map(str::trim).filter(|s| !s.is_empty());
    Ok((input, (name, rows)))
}
